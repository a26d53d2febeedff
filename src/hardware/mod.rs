// Hardware discovery and vendor classification

pub mod descriptor;
pub mod registry;

pub use descriptor::{HardwareDescriptor, HardwareKind, PresentationTier, classify};
pub use registry::DriverRegistry;
