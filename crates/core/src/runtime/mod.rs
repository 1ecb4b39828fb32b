mod loop_control;
mod period;
mod scheduler;
mod shutdown;
mod watchdog;

pub use loop_control::{after_check, after_decision, decide, Decision};
pub use period::Period;
pub use scheduler::{IntervalScheduler, JobFlow, ScheduleExit, ScheduleHandle, ScheduledJob};
pub use shutdown::ShutdownGuard;
pub use watchdog::{CycleReport, RunOutcome, Watchdog};
pub use crate::types::WatchdogStatus;
