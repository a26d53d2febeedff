// Software loopback backend - pure in-process simulation.
//
// Used when no vendor driver binds (or none exists). Owns a best-effort
// periodic timer thread that drives the bridge once per buffer period; the
// start/stop synchronization contract is the same as for a vendor backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::info;

use crate::backend::Backend;
use crate::bridge::CallbackBridge;
use crate::config::{
    EffectiveConfig, StreamConfig, SUPPORTED_BUFFER_SIZES, SUPPORTED_SAMPLE_RATES, nearest_preset,
};
use crate::error::{BindError, ConfigError, StreamError};
use crate::hardware::descriptor::{HardwareDescriptor, HardwareKind};

pub const LOOPBACK_NAME: &str = "Software Loopback";

struct TimerWorker {
    run: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct SoftwareLoopbackBackend {
    bound: bool,
    input_channels: u16,
    output_channels: u16,
    negotiated: Option<EffectiveConfig>,
    worker: Option<TimerWorker>,
}

impl SoftwareLoopbackBackend {
    /// Fallback defaults: 8 in / 8 out, like a small stage box.
    pub fn new() -> Self {
        Self::with_channels(8, 8)
    }

    pub fn with_channels(input_channels: u16, output_channels: u16) -> Self {
        Self {
            bound: false,
            input_channels,
            output_channels,
            negotiated: None,
            worker: None,
        }
    }
}

impl Default for SoftwareLoopbackBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for SoftwareLoopbackBackend {
    fn kind(&self) -> HardwareKind {
        HardwareKind::Generic
    }

    fn name(&self) -> &str {
        LOOPBACK_NAME
    }

    /// The loopback accepts any descriptor and never fails to bind, except
    /// for the double-bind contract violation.
    fn bind(&mut self, _descriptor: &HardwareDescriptor) -> Result<(), BindError> {
        if self.bound {
            return Err(BindError::AlreadyBound);
        }
        self.bound = true;
        Ok(())
    }

    fn unbind(&mut self) {
        self.stop();
        self.bound = false;
        self.negotiated = None;
    }

    fn is_bound(&self) -> bool {
        self.bound
    }

    fn negotiate(&mut self, request: &StreamConfig) -> Result<EffectiveConfig, ConfigError> {
        if !self.bound {
            return Err(ConfigError::NotBound);
        }

        let effective = EffectiveConfig {
            sample_rate: nearest_preset(request.sample_rate, &SUPPORTED_SAMPLE_RATES),
            buffer_frames: nearest_preset(request.buffer_frames, &SUPPORTED_BUFFER_SIZES),
            input_channels: request.input_channels.min(self.input_channels),
            output_channels: request.output_channels.min(self.output_channels),
            // Simulation has no driver buffering; the latency figure derived
            // from this config is a theoretical minimum, not a measurement.
            native_latency_frames: 0,
        };
        self.negotiated = Some(effective);
        Ok(effective)
    }

    fn input_channels(&self) -> u16 {
        if self.bound { self.input_channels } else { 0 }
    }

    fn output_channels(&self) -> u16 {
        if self.bound { self.output_channels } else { 0 }
    }

    fn native_latency_frames(&self) -> u32 {
        0
    }

    fn start(&mut self, bridge: Arc<CallbackBridge>) -> Result<(), StreamError> {
        if !self.bound || self.negotiated.is_none() {
            return Err(StreamError::StartFailed(
                "loopback backend is not bound and negotiated".to_string(),
            ));
        }
        if self.worker.is_some() {
            return Err(StreamError::StartFailed(
                "loopback timer already running".to_string(),
            ));
        }

        // setup_changed fires here, on the control thread, before the timer
        // thread delivers its first period.
        bridge.prepare();

        let period = Duration::from_nanos(
            (bridge.buffer_frames() as f64 / bridge.sample_rate() as f64 * 1_000_000_000.0) as u64,
        );

        let run = Arc::new(AtomicBool::new(true));
        let run_flag = run.clone();

        let handle = std::thread::Builder::new()
            .name("loopback-timer".to_string())
            .spawn(move || {
                while run_flag.load(Ordering::Acquire) {
                    let started = Instant::now();
                    bridge.run_period_detached();
                    // Best-effort pacing; a missed deadline self-reports
                    // through the underrun counter, nothing kills the thread.
                    let elapsed = started.elapsed();
                    if elapsed < period {
                        std::thread::sleep(period - elapsed);
                    }
                }
            })
            .map_err(|e| StreamError::StartFailed(format!("timer thread spawn: {e}")))?;

        info!("loopback streaming started ({period:?} period)");
        self.worker = Some(TimerWorker { run, handle });
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.run.store(false, Ordering::Release);
            // Joining waits out the period currently executing.
            let _ = worker.handle.join();
            info!("loopback streaming stopped");
        }
    }
}
