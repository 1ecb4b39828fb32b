use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::types::{DeviceSnapshot, SnapshotSet};

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("cannot parse device line {line:?}: {reason}")]
    Parse { line: String, reason: String },
    #[error("scripted probe has no snapshots")]
    Exhausted,
}

/// Source of per-device snapshots. Called once per watchdog cycle.
#[async_trait::async_trait]
pub trait DeviceProbe: Send + Sync {
    fn name(&self) -> &str;

    async fn snapshot(&self) -> Result<SnapshotSet, ProbeError>;
}

/// Probe that replays scripted frames in order and then repeats the last one.
#[derive(Debug)]
pub struct StaticProbe {
    frames: Mutex<VecDeque<Vec<DeviceSnapshot>>>,
    calls: AtomicUsize,
}

impl StaticProbe {
    pub fn new(frames: impl IntoIterator<Item = Vec<DeviceSnapshot>>) -> Self {
        Self {
            frames: Mutex::new(frames.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Probe that always reports the same devices.
    pub fn fixed(devices: Vec<DeviceSnapshot>) -> Self {
        Self::new([devices])
    }

    /// Number of snapshots taken so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DeviceProbe for StaticProbe {
    fn name(&self) -> &str {
        "static"
    }

    async fn snapshot(&self) -> Result<SnapshotSet, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut frames = self
            .frames
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let devices = if frames.len() > 1 {
            frames.pop_front()
        } else {
            frames.front().cloned()
        };
        devices.map(SnapshotSet::new).ok_or(ProbeError::Exhausted)
    }
}
