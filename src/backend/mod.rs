// Backend capability contract
//
// One trait over every concrete driver binding: the vendor-driver backend
// (real hardware through CPAL) and the software loopback (in-process
// simulation used when no hardware binds). Object-safe so the interface can
// pick an implementation at runtime.

pub mod loopback;
pub mod vendor;

use std::sync::Arc;

use crate::bridge::CallbackBridge;
use crate::config::{EffectiveConfig, StreamConfig};
use crate::error::{BindError, ConfigError, StreamError};
use crate::hardware::descriptor::{HardwareDescriptor, HardwareKind};

pub use loopback::SoftwareLoopbackBackend;
pub use vendor::VendorDriverBackend;

/// A concrete binding to one driver.
///
/// Lifecycle: `bind` → `negotiate` → `start` → `stop` → `unbind`. A backend
/// is bound to at most one interface at a time; `bind` on an already-bound
/// backend returns [`BindError::AlreadyBound`] instead of rebinding.
pub trait Backend {
    /// Vendor classification of the bound driver; [`HardwareKind::Generic`]
    /// while unbound.
    fn kind(&self) -> HardwareKind;

    /// Driver identity for reporting.
    fn name(&self) -> &str;

    /// Activate the driver named by the descriptor.
    fn bind(&mut self, descriptor: &HardwareDescriptor) -> Result<(), BindError>;

    /// Release the driver. Stops streaming first if needed. Idempotent.
    fn unbind(&mut self);

    fn is_bound(&self) -> bool;

    /// Ask for the requested configuration; answers with the nearest the
    /// driver supports. Mismatches are never errors - only an unbound or
    /// unreachable backend fails.
    fn negotiate(&mut self, request: &StreamConfig) -> Result<EffectiveConfig, ConfigError>;

    /// Capture channel count. Zero while unbound.
    fn input_channels(&self) -> u16;

    /// Playback channel count. Zero while unbound.
    fn output_channels(&self) -> u16;

    /// Driver-reported buffering beyond one period, in frames. Zero while
    /// unbound and for the software fallback.
    fn native_latency_frames(&self) -> u32;

    /// Begin the real-time callback stream, driving the bridge once per
    /// period from the backend's own thread.
    fn start(&mut self, bridge: Arc<CallbackBridge>) -> Result<(), StreamError>;

    /// End the callback stream, waiting for the in-flight period. No-op
    /// when not started.
    fn stop(&mut self);
}
