// Stagelink - ultra-low-latency audio hardware abstraction
//
// Discovers vendor audio drivers, binds the best candidate (or a software
// loopback when none is present), and delivers periodic real-time buffers
// to an application-supplied processor with latency/CPU/underrun accounting.

pub mod backend;
pub mod bridge;
pub mod config;
pub mod error;
pub mod format;
pub mod hardware;
pub mod interface;
pub mod metrics;
pub mod notify;
pub mod processor;

// Re-export commonly used types for convenience
pub use backend::{Backend, SoftwareLoopbackBackend, VendorDriverBackend};
pub use bridge::CallbackBridge;
pub use config::{
    DEFAULT_BUFFER_FRAMES, DEFAULT_SAMPLE_RATE, EffectiveConfig, StreamConfig,
    SUPPORTED_BUFFER_SIZES, SUPPORTED_SAMPLE_RATES,
};
pub use error::{BindError, ConfigError, ProcessorError, StreamError};
pub use hardware::{DriverRegistry, HardwareDescriptor, HardwareKind, classify};
pub use interface::{AudioInterface, InitReport, InterfaceState};
pub use metrics::{MetricsCollector, PerformanceSnapshot};
pub use notify::{Notification, NotificationCategory, NotificationLevel};
pub use processor::{AudioProcessor, FrameSet, PassthroughProcessor};
