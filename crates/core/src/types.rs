use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One accelerator device as seen at a single sampling instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub index: u32,
    /// Free memory in MB, the same unit as `Policy::threshold_mb`.
    pub free_memory_mb: f64,
    /// Human-readable one-line summary; carried into notifications as-is.
    pub display: String,
}

impl DeviceSnapshot {
    pub fn new(index: u32, free_memory_mb: f64, display: impl Into<String>) -> Self {
        Self {
            index,
            free_memory_mb,
            display: display.into(),
        }
    }
}

/// All devices from one sampling pass, in provider order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSet {
    pub devices: Vec<DeviceSnapshot>,
    pub taken_at: DateTime<Utc>,
}

impl SnapshotSet {
    pub fn new(devices: Vec<DeviceSnapshot>) -> Self {
        Self {
            devices,
            taken_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }
}

/// Device indices that satisfied the policy in one cycle, in snapshot order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult(Vec<u32>);

impl MatchResult {
    pub fn new(devices: Vec<u32>) -> Self {
        Self(devices)
    }

    pub fn devices(&self) -> &[u32] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Comma-joined indices, e.g. `0,2`.
    pub fn joined(&self) -> String {
        self.0
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Watchdog loop phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchdogPhase {
    /// Waiting for the next scheduled fire.
    #[default]
    Idle,
    /// Sampling devices and evaluating the policy.
    Checking,
    /// Notifying and, if enabled, launching the preemption workload.
    Reacting,
    /// Choosing between another scheduled fire and termination.
    Deciding,
    Terminated,
}

/// Mutable loop state. Owned and touched only by the watchdog loop.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    /// Completed checks so far. The first check observes 0.
    pub check_count: u64,
    pub phase: WatchdogPhase,
    pub last_match: MatchResult,
}

impl RunState {
    pub fn is_running(&self) -> bool {
        self.phase != WatchdogPhase::Terminated
    }
}

/// Snapshot of loop progress broadcast to observers after every phase change.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WatchdogStatus {
    pub phase: WatchdogPhase,
    pub check_count: u64,
    pub last_match: Vec<u32>,
    pub last_error: Option<String>,
}
