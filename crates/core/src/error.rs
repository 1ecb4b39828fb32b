use std::path::PathBuf;

use gpudog_push::PushError;

use crate::environment::ProbeError;
use crate::preempt::LaunchError;

/// Top-level error type for the watchdog.
#[derive(Debug, thiserror::Error)]
pub enum WatchdogError {
    /// Check-frequency string does not follow the `<int><unit>` token grammar.
    #[error("invalid check frequency {input:?}: {details}")]
    InvalidFormat { input: String, details: String },

    /// Check frequency parsed to zero; the schedule would never pause.
    #[error("check frequency {input:?} is zero; use e.g. 30s or 10m")]
    ZeroPeriod { input: String },

    /// Device snapshot collection failed. Fatal to the process.
    #[error("device probe failed: {0}")]
    Probe(#[from] ProbeError),

    #[error("notification failed: {0}")]
    Notify(#[from] PushError),

    #[error("preemption launch failed: {0}")]
    Launch(#[from] LaunchError),

    #[error("credential file {path}: {details}")]
    Credentials { path: PathBuf, details: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WatchdogError {
    /// Whether the watchdog loop may carry on to its next scheduled check.
    pub fn is_cycle_local(&self) -> bool {
        matches!(self, Self::Notify(_) | Self::Launch(_))
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
