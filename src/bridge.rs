// Real-time callback bridge
//
// Adapts a backend's native per-period invocation into the uniform
// `AudioProcessor` contract. The period path is the sacred zone: no
// allocations, no I/O, no blocking locks. The interior mutex is only ever
// contended by `deactivate`, which is also what makes stop synchronization
// work: once `deactivate` returns, no callback is in flight and none will
// start.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use cpal::{FromSample, Sample};

use crate::config::EffectiveConfig;
use crate::format::{silence_interleaved, write_frames_to_interleaved};
use crate::metrics::MetricsCollector;
use crate::processor::{AudioProcessor, FrameSet};

struct BridgeInner {
    processor: Box<dyn AudioProcessor>,
    inputs: FrameSet,
    outputs: FrameSet,
}

/// One bridge per streaming session. The owning backend drives it from its
/// real-time thread; the interface deactivates it from the control thread.
pub struct CallbackBridge {
    inner: Mutex<BridgeInner>,
    active: AtomicBool,
    metrics: MetricsCollector,
    sample_rate: u32,
    buffer_frames: u32,
}

enum PeriodOutcome {
    /// Processor produced valid output frames.
    Processed,
    /// Processor faulted or could not run; output must be silence.
    Silenced,
}

impl CallbackBridge {
    pub fn new(
        processor: Box<dyn AudioProcessor>,
        config: &EffectiveConfig,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            inner: Mutex::new(BridgeInner {
                processor,
                inputs: FrameSet::new(config.input_channels as usize, config.buffer_frames as usize),
                outputs: FrameSet::new(
                    config.output_channels as usize,
                    config.buffer_frames as usize,
                ),
            }),
            active: AtomicBool::new(false),
            metrics,
            sample_rate: config.sample_rate,
            buffer_frames: config.buffer_frames,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_frames(&self) -> u32 {
        self.buffer_frames
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Arm the bridge. Runs `setup_changed` exactly once, synchronously on
    /// the calling (control) thread, before any period can fire.
    pub fn prepare(&self) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner
            .processor
            .setup_changed(self.sample_rate, self.buffer_frames);
        self.active.store(true, Ordering::Release);
    }

    /// Disarm and wait out any in-flight period.
    ///
    /// After this returns the processor is guaranteed not to be invoked
    /// again, so the caller may drop it.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
        // Blocks until the period currently holding the lock (if any) has
        // completed. Subsequent periods see the cleared flag and bail out.
        let _inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
    }

    /// Vendor-driver period: process one buffer and write it into the
    /// driver's interleaved output buffer, converting from internal f32.
    pub fn run_period_interleaved<T>(&self, data: &mut [T], device_channels: usize)
    where
        T: Sample + FromSample<f32>,
    {
        if !self.is_active() {
            silence_interleaved(data);
            return;
        }

        let Ok(mut inner) = self.inner.try_lock() else {
            // Only deactivate holds this lock; we are being stopped.
            silence_interleaved(data);
            return;
        };

        // Re-check under the lock: a deactivate may have completed between
        // the flag check above and the lock acquisition.
        if !self.is_active() {
            silence_interleaved(data);
            return;
        }

        // Drivers routinely deliver buffers larger than the negotiated
        // period (notably after a BufferSize::Default fallback). Run the
        // processor once per period-sized slice so the whole buffer carries
        // processed audio, not one period followed by silence.
        let period_len = (self.buffer_frames as usize * device_channels).max(1);
        for chunk in data.chunks_mut(period_len) {
            let measure = self.metrics.begin_period();
            match run_processor(&mut inner) {
                PeriodOutcome::Processed => {
                    write_frames_to_interleaved(&inner.outputs, chunk, device_channels);
                }
                PeriodOutcome::Silenced => {
                    self.metrics.count_underrun();
                    silence_interleaved(chunk);
                }
            }
            self.metrics.end_period(measure);
        }
    }

    /// Loopback period: process one buffer with nowhere to play it. The
    /// software backend calls this from its timer thread.
    pub fn run_period_detached(&self) {
        if !self.is_active() {
            return;
        }

        let measure = self.metrics.begin_period();

        let Ok(mut inner) = self.inner.try_lock() else {
            return;
        };

        if !self.is_active() {
            return;
        }

        if let PeriodOutcome::Silenced = run_processor(&mut inner) {
            self.metrics.count_underrun();
        }

        self.metrics.end_period(measure);
    }
}

fn run_processor(inner: &mut BridgeInner) -> PeriodOutcome {
    let frames = inner.inputs.frames();

    // Capture wiring lives outside this layer; inputs are delivered zeroed.
    inner.inputs.silence();

    let BridgeInner {
        processor,
        inputs,
        outputs,
    } = inner;

    match processor.process_audio(inputs, outputs, frames) {
        Ok(()) => PeriodOutcome::Processed,
        Err(_) => {
            outputs.silence();
            PeriodOutcome::Silenced
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessorError;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU64;

    fn test_config() -> EffectiveConfig {
        EffectiveConfig {
            sample_rate: 48_000,
            buffer_frames: 64,
            input_channels: 2,
            output_channels: 2,
            native_latency_frames: 0,
        }
    }

    struct CountingProcessor {
        setups: Arc<AtomicU64>,
        periods: Arc<AtomicU64>,
        fail_after: Option<u64>,
    }

    impl AudioProcessor for CountingProcessor {
        fn setup_changed(&mut self, _sample_rate: u32, _buffer_frames: u32) {
            self.setups.fetch_add(1, Ordering::SeqCst);
        }

        fn process_audio(
            &mut self,
            _inputs: &FrameSet,
            outputs: &mut FrameSet,
            frames: usize,
        ) -> Result<(), ProcessorError> {
            let period = self.periods.fetch_add(1, Ordering::SeqCst);
            if let Some(limit) = self.fail_after {
                if period >= limit {
                    return Err(ProcessorError::new("synthetic fault"));
                }
            }
            outputs.channel_mut(0)[..frames].fill(0.5);
            Ok(())
        }
    }

    fn counting_bridge(fail_after: Option<u64>) -> (CallbackBridge, Arc<AtomicU64>, Arc<AtomicU64>) {
        let setups = Arc::new(AtomicU64::new(0));
        let periods = Arc::new(AtomicU64::new(0));
        let processor = CountingProcessor {
            setups: setups.clone(),
            periods: periods.clone(),
            fail_after,
        };
        let metrics = MetricsCollector::new(1);
        metrics.configure(48_000, 64);
        let bridge = CallbackBridge::new(Box::new(processor), &test_config(), metrics);
        (bridge, setups, periods)
    }

    #[test]
    fn test_setup_changed_fires_once_per_prepare() {
        let (bridge, setups, _) = counting_bridge(None);
        bridge.prepare();
        assert_eq!(setups.load(Ordering::SeqCst), 1);

        bridge.run_period_detached();
        bridge.run_period_detached();
        assert_eq!(setups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_periods_do_not_run_before_prepare() {
        let (bridge, _, periods) = counting_bridge(None);
        bridge.run_period_detached();
        assert_eq!(periods.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_processor_output_is_interleaved() {
        let (bridge, _, _) = counting_bridge(None);
        bridge.prepare();

        let mut data = vec![9.9f32; 64 * 2];
        bridge.run_period_interleaved(&mut data, 2);

        // Channel 0 carries 0.5, channel 1 stays silent.
        assert_eq!(data[0], 0.5);
        assert_eq!(data[1], 0.0);
        assert_eq!(data[2], 0.5);
    }

    #[test]
    fn test_oversized_driver_buffer_is_fully_processed() {
        let (bridge, _, periods) = counting_bridge(None);
        bridge.prepare();

        // Two negotiated periods' worth of frames delivered in one callback.
        let mut data = vec![9.9f32; 64 * 2 * 2];
        bridge.run_period_interleaved(&mut data, 2);

        assert_eq!(periods.load(Ordering::SeqCst), 2);
        // First frame of the second period still carries processed audio.
        assert_eq!(data[64 * 2], 0.5);
        assert_eq!(data[data.len() - 2], 0.5);
        assert_eq!(data[data.len() - 1], 0.0);
    }

    #[test]
    fn test_processor_fault_counts_underrun_and_silences() {
        let (bridge, _, _) = counting_bridge(Some(1));
        let metrics = bridge.metrics.clone();
        bridge.prepare();

        let mut data = vec![9.9f32; 64 * 2];
        bridge.run_period_interleaved(&mut data, 2); // ok
        assert_eq!(metrics.underrun_count(), 0);

        bridge.run_period_interleaved(&mut data, 2); // faults
        assert_eq!(metrics.underrun_count(), 1);
        assert!(data.iter().all(|&s| s == 0.0));

        bridge.run_period_interleaved(&mut data, 2); // faults again
        assert_eq!(metrics.underrun_count(), 2);
    }

    #[test]
    fn test_deactivate_stops_periods() {
        let (bridge, _, periods) = counting_bridge(None);
        bridge.prepare();
        bridge.run_period_detached();
        assert_eq!(periods.load(Ordering::SeqCst), 1);

        bridge.deactivate();
        bridge.run_period_detached();
        bridge.run_period_detached();
        assert_eq!(periods.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_inactive_interleaved_period_outputs_silence() {
        let (bridge, _, _) = counting_bridge(None);
        let mut data = vec![9.9f32; 16];
        bridge.run_period_interleaved(&mut data, 2);
        assert!(data.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_no_callback_races_past_deactivate() {
        // Hammer periods from another thread while deactivating; the period
        // counter must not advance after deactivate() returns.
        let (bridge, _, periods) = counting_bridge(None);
        bridge.prepare();
        let bridge = Arc::new(bridge);

        let rt = {
            let bridge = bridge.clone();
            std::thread::spawn(move || {
                for _ in 0..10_000 {
                    bridge.run_period_detached();
                }
            })
        };

        std::thread::sleep(std::time::Duration::from_millis(1));
        bridge.deactivate();
        let after_stop = periods.load(Ordering::SeqCst);

        rt.join().unwrap();
        assert_eq!(periods.load(Ordering::SeqCst), after_stop);
    }
}
