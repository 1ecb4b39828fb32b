//! Device snapshot collection.

pub mod nvidia;
pub mod probe;

pub use nvidia::NvidiaSmiProbe;
pub use probe::{DeviceProbe, ProbeError, StaticProbe};
