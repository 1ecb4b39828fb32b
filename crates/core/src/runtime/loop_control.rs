use crate::types::{MatchResult, WatchdogPhase};

/// Outcome of the `Deciding` phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Go back to `Idle` and wait for the next scheduled fire.
    Continue,
    /// Terminate the schedule. Launched workloads are left running.
    Stop,
}

/// Phase that follows a completed check.
pub fn after_check(matched: &MatchResult) -> WatchdogPhase {
    if matched.is_empty() {
        WatchdogPhase::Deciding
    } else {
        WatchdogPhase::Reacting
    }
}

/// Stop after the first match unless running continuously.
pub fn decide(matched: &MatchResult, continuous: bool) -> Decision {
    if !matched.is_empty() && !continuous {
        Decision::Stop
    } else {
        Decision::Continue
    }
}

/// Phase entered once a decision is made.
pub fn after_decision(decision: Decision) -> WatchdogPhase {
    match decision {
        Decision::Continue => WatchdogPhase::Idle,
        Decision::Stop => WatchdogPhase::Terminated,
    }
}
