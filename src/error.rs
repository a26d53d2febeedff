// Error taxonomy - every failure cause is a distinct variant so callers can
// branch on it instead of parsing strings.

use thiserror::Error;

/// Failure to activate a driver for a discovered descriptor.
///
/// All bind errors are recoverable: the interface falls through to the next
/// candidate and ultimately to the software loopback, which never fails.
#[derive(Debug, Clone, Error)]
pub enum BindError {
    /// The named driver could not be activated (unplugged, not installed,
    /// or no longer present in the device list).
    #[error("driver unavailable: {0}")]
    DriverUnavailable(String),

    /// The OS denied access to the device (exclusive mode held elsewhere,
    /// missing permissions).
    #[error("permission denied for driver: {0}")]
    PermissionDenied(String),

    /// `bind` was called twice without an intervening `unbind`.
    #[error("backend is already bound")]
    AlreadyBound,
}

/// Failure during stream configuration negotiation.
///
/// Mismatched sample rates or buffer sizes are never errors - negotiation
/// snaps to the nearest supported values. These variants cover the backend
/// itself being unusable.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Negotiation requires a bound backend.
    #[error("backend is not bound")]
    NotBound,

    /// The bound device stopped answering configuration queries.
    #[error("backend unreachable: {0}")]
    Unreachable(String),
}

/// Streaming lifecycle errors returned by the interface.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    /// `start_streaming` was called before `initialize`.
    #[error("interface is not initialized")]
    NotInitialized,

    /// `start_streaming` was called while a session is already active.
    #[error("a streaming session is already active")]
    AlreadyStreaming,

    /// The driver rejected stream activation. The interface stays
    /// Initialized so the caller may retry or reconfigure.
    #[error("driver rejected stream start: {0}")]
    StartFailed(String),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Error a processor may raise from its real-time callback.
///
/// The bridge converts this into a counted underrun plus silent output for
/// the period; it is never propagated across the real-time boundary.
#[derive(Debug, Clone, Error)]
#[error("processor fault: {reason}")]
pub struct ProcessorError {
    pub reason: &'static str,
}

impl ProcessorError {
    /// `reason` must be a static string: this type crosses the real-time
    /// path and must not allocate.
    pub fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}
