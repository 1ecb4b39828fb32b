//! Core of the GPU watchdog: periodically samples devices, checks them
//! against a free-memory policy, pushes a notification on a match and can
//! launch a dependent workload on the matched devices.

pub mod condition;
pub mod config;
pub mod credentials;
pub mod environment;
pub mod error;
pub mod notify;
pub mod preempt;
pub mod runtime;
pub mod types;

pub use error::WatchdogError;
