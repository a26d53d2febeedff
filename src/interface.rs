// Audio interface orchestrator
//
// Owns the active backend and the lifecycle state machine. Methods take
// `&mut self`: the exclusive borrow is what serializes state transitions -
// a multi-threaded controller puts the interface behind its own mutex. The
// real-time thread never transitions state; it only touches the bridge.

use std::sync::{Arc, Mutex};

use log::{info, warn};
use ringbuf::traits::Consumer;

use crate::backend::{Backend, SoftwareLoopbackBackend, VendorDriverBackend};
use crate::bridge::CallbackBridge;
use crate::config::{
    EffectiveConfig, StreamConfig, SUPPORTED_BUFFER_SIZES, SUPPORTED_SAMPLE_RATES, latency_ms,
};
use crate::error::{BindError, StreamError};
use crate::hardware::descriptor::{HardwareDescriptor, HardwareKind};
use crate::hardware::registry::DriverRegistry;
use crate::metrics::{MetricsCollector, PerformanceSnapshot};
use crate::notify::{
    Notification, NotificationCategory, NotificationConsumer, NotificationProducer,
    create_notification_channel,
};
use crate::processor::AudioProcessor;

const NOTIFICATION_CAPACITY: usize = 256;

/// Lifecycle state. Transitions happen only on the control thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceState {
    Uninitialized,
    Initialized,
    Streaming,
    ShuttingDown,
}

/// Outcome of `initialize`. Initialization itself always succeeds when the
/// call is legal; this report says how, and exposes the bind errors that
/// forced a fallback instead of swallowing them.
#[derive(Debug)]
pub struct InitReport {
    pub effective: EffectiveConfig,
    /// True when streaming runs on the software loopback rather than a
    /// vendor driver (no hardware found, or every bind failed).
    pub fell_back: bool,
    /// Per-driver failures encountered while walking the candidate list.
    pub bind_failures: Vec<(String, BindError)>,
}

pub struct AudioInterface {
    registry: DriverRegistry,
    state: InterfaceState,
    backend: Option<Box<dyn Backend>>,
    effective: Option<EffectiveConfig>,
    bridge: Option<Arc<CallbackBridge>>,
    metrics: MetricsCollector,
    faults_tx: Arc<Mutex<NotificationProducer>>,
    faults_rx: NotificationConsumer,
    /// Channel counts the loopback fallback advertises.
    fallback_channels: (u16, u16),
    /// Used for the theoretical latency answer while Uninitialized.
    default_config: StreamConfig,
}

impl AudioInterface {
    /// Interface backed by the OS driver registry.
    pub fn new() -> Self {
        Self::with_registry(DriverRegistry::system())
    }

    pub fn with_registry(registry: DriverRegistry) -> Self {
        let (faults_tx, faults_rx) = create_notification_channel(NOTIFICATION_CAPACITY);
        Self {
            registry,
            state: InterfaceState::Uninitialized,
            backend: None,
            effective: None,
            bridge: None,
            metrics: MetricsCollector::default(),
            faults_tx: Arc::new(Mutex::new(faults_tx)),
            faults_rx,
            fallback_channels: (8, 8),
            default_config: StreamConfig::default(),
        }
    }

    /// Change the channel counts the software fallback advertises (2/2 for
    /// a desktop rig, 8/8 for a stage box). Takes effect on the next
    /// `initialize`.
    pub fn set_fallback_channels(&mut self, inputs: u16, outputs: u16) {
        self.fallback_channels = (inputs, outputs);
    }

    /// Discover drivers, bind the first that accepts, fall back to the
    /// software loopback when none does.
    ///
    /// Absent or misbehaving hardware never fails the application: the
    /// interface always ends up Initialized, in simulation mode if need be.
    /// The only error is the contract violation of calling this while a
    /// streaming session is active.
    pub fn initialize(&mut self, config: StreamConfig) -> Result<InitReport, StreamError> {
        if self.state == InterfaceState::Streaming {
            return Err(StreamError::AlreadyStreaming);
        }

        // Re-initialize from Initialized re-runs the whole sequence.
        self.release_backend();
        self.metrics.reset();

        let mut bind_failures = Vec::new();
        let mut bound: Option<(Box<dyn Backend>, EffectiveConfig)> = None;

        for descriptor in self.registry.discover() {
            match self.try_vendor(&descriptor, &config) {
                Ok(ready) => {
                    info!(
                        "bound vendor driver: {} ({})",
                        descriptor.identity, descriptor.kind
                    );
                    bound = Some(ready);
                    break;
                }
                Err(err) => {
                    warn!("driver {} rejected bind: {err}", descriptor.identity);
                    self.push_notification(Notification::warning(
                        NotificationCategory::Driver,
                        format!("{}: {err}", descriptor.identity),
                    ));
                    bind_failures.push((descriptor.identity.clone(), err));
                }
            }
        }

        let fell_back = bound.is_none();
        let (backend, effective) = match bound {
            Some(ready) => ready,
            None => self.bind_loopback(&config)?,
        };

        if fell_back {
            info!("no vendor driver bound, running in simulation mode");
            self.push_notification(Notification::warning(
                NotificationCategory::Discovery,
                "no hardware bound, using software loopback".to_string(),
            ));
        }

        if effective.differs_from(&config) {
            info!(
                "request adjusted: {} Hz / {} frames granted as {} Hz / {} frames",
                config.sample_rate,
                config.buffer_frames,
                effective.sample_rate,
                effective.buffer_frames
            );
            self.push_notification(Notification::info(
                NotificationCategory::Driver,
                format!(
                    "requested {} Hz / {} frames, driver granted {} Hz / {} frames",
                    config.sample_rate,
                    config.buffer_frames,
                    effective.sample_rate,
                    effective.buffer_frames
                ),
            ));
        }

        self.metrics
            .configure(effective.sample_rate, effective.buffer_frames);
        self.metrics.set_latency_ms(effective.latency_ms());

        self.backend = Some(backend);
        self.effective = Some(effective);
        self.state = InterfaceState::Initialized;

        Ok(InitReport {
            effective,
            fell_back,
            bind_failures,
        })
    }

    fn try_vendor(
        &self,
        descriptor: &HardwareDescriptor,
        config: &StreamConfig,
    ) -> Result<(Box<dyn Backend>, EffectiveConfig), BindError> {
        let mut backend = VendorDriverBackend::new(self.faults_tx.clone());
        backend.bind(descriptor)?;
        match backend.negotiate(config) {
            Ok(effective) => Ok((Box::new(backend), effective)),
            // A device that answers bind but not negotiation is as good as
            // absent; report it with the same recovery path.
            Err(err) => Err(BindError::DriverUnavailable(format!(
                "{}: {err}",
                descriptor.identity
            ))),
        }
    }

    fn bind_loopback(
        &self,
        config: &StreamConfig,
    ) -> Result<(Box<dyn Backend>, EffectiveConfig), StreamError> {
        let (inputs, outputs) = self.fallback_channels;
        let mut backend = SoftwareLoopbackBackend::with_channels(inputs, outputs);
        let descriptor =
            HardwareDescriptor::from_name(crate::backend::loopback::LOOPBACK_NAME, 0);
        backend.bind(&descriptor)?;
        let effective = backend.negotiate(config).map_err(StreamError::Config)?;
        Ok((Box::new(backend), effective))
    }

    /// Begin a streaming session, invoking the processor once per period
    /// from the backend's real-time thread.
    ///
    /// On failure the interface stays Initialized so the caller may retry.
    pub fn start_streaming(
        &mut self,
        processor: Box<dyn AudioProcessor>,
    ) -> Result<(), StreamError> {
        match self.state {
            InterfaceState::Uninitialized | InterfaceState::ShuttingDown => {
                return Err(StreamError::NotInitialized);
            }
            InterfaceState::Streaming => return Err(StreamError::AlreadyStreaming),
            InterfaceState::Initialized => {}
        }

        let effective = self.effective.ok_or(StreamError::NotInitialized)?;
        let bridge = Arc::new(CallbackBridge::new(
            processor,
            &effective,
            self.metrics.clone(),
        ));

        let backend = self.backend.as_mut().ok_or(StreamError::NotInitialized)?;
        backend.start(bridge.clone())?;

        self.bridge = Some(bridge);
        self.state = InterfaceState::Streaming;
        Ok(())
    }

    /// End the streaming session. Always succeeds; blocks until any
    /// in-flight callback has completed, so the processor is never invoked
    /// after this returns. No-op when not streaming.
    pub fn stop_streaming(&mut self) {
        if self.state != InterfaceState::Streaming {
            return;
        }

        if let Some(bridge) = &self.bridge {
            bridge.deactivate();
        }
        if let Some(backend) = self.backend.as_mut() {
            backend.stop();
        }
        // Dropping the bridge drops the processor; safe now that no period
        // can be in flight.
        self.bridge = None;
        self.state = InterfaceState::Initialized;
    }

    /// Stop streaming, release the backend, return to Uninitialized.
    /// Idempotent.
    pub fn shutdown(&mut self) {
        if self.state == InterfaceState::Uninitialized {
            return;
        }
        self.state = InterfaceState::ShuttingDown;
        if let Some(bridge) = &self.bridge {
            bridge.deactivate();
        }
        self.release_backend();
        self.bridge = None;
        self.effective = None;
        self.state = InterfaceState::Uninitialized;
        info!("interface shut down");
    }

    fn release_backend(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.stop();
            backend.unbind();
        }
    }

    // --- queries, valid in any state -----------------------------------

    pub fn state(&self) -> InterfaceState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        matches!(
            self.state,
            InterfaceState::Initialized | InterfaceState::Streaming
        )
    }

    pub fn is_streaming(&self) -> bool {
        self.state == InterfaceState::Streaming
    }

    /// Vendor classification of the bound driver; Generic while unbound.
    pub fn kind(&self) -> HardwareKind {
        self.backend
            .as_ref()
            .map(|backend| backend.kind())
            .unwrap_or(HardwareKind::Generic)
    }

    pub fn name(&self) -> &str {
        self.backend
            .as_ref()
            .map(|backend| backend.name())
            .unwrap_or("(unbound)")
    }

    pub fn input_channel_count(&self) -> u16 {
        self.backend
            .as_ref()
            .map(|backend| backend.input_channels())
            .unwrap_or(0)
    }

    pub fn output_channel_count(&self) -> u16 {
        self.backend
            .as_ref()
            .map(|backend| backend.output_channels())
            .unwrap_or(0)
    }

    /// Round-trip latency in ms: one buffer period plus the driver-reported
    /// term. While Uninitialized this is the theoretical buffer-only figure
    /// for the default configuration, not a measured value.
    pub fn current_latency_ms(&self) -> f64 {
        match self.effective {
            Some(effective) => effective.latency_ms(),
            None => latency_ms(
                self.default_config.sample_rate,
                self.default_config.buffer_frames,
                0,
            ),
        }
    }

    pub fn metrics(&self) -> PerformanceSnapshot {
        self.metrics.snapshot()
    }

    pub fn effective_config(&self) -> Option<EffectiveConfig> {
        self.effective
    }

    pub fn supported_sample_rates(&self) -> &'static [u32] {
        &SUPPORTED_SAMPLE_RATES
    }

    pub fn supported_buffer_sizes(&self) -> &'static [u32] {
        &SUPPORTED_BUFFER_SIZES
    }

    /// Drain queued driver fault reports. Control thread only.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut drained = Vec::new();
        while let Some(notification) = self.faults_rx.try_pop() {
            drained.push(notification);
        }
        drained
    }

    fn push_notification(&self, notification: Notification) {
        if let Ok(mut tx) = self.faults_tx.try_lock() {
            let _ = ringbuf::traits::Producer::try_push(&mut *tx, notification);
        }
    }
}

impl Default for AudioInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AudioInterface {
    fn drop(&mut self) {
        self.shutdown();
    }
}
