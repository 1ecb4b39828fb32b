use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::loop_control::{self, Decision};
use super::period::Period;
use super::scheduler::{IntervalScheduler, JobFlow, ScheduleExit, ScheduledJob};
use super::shutdown::ShutdownGuard;
use crate::condition;
use crate::config::Policy;
use crate::environment::DeviceProbe;
use crate::error::WatchdogError;
use crate::notify::Notifier;
use crate::preempt::{LaunchedProcess, Launcher};
use crate::types::{MatchResult, RunState, SnapshotSet, WatchdogPhase, WatchdogStatus};

/// What happened during one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Check number observed by this cycle's reactions.
    pub check: u64,
    pub matched: MatchResult,
    pub notified: bool,
    pub launched: Option<LaunchedProcess>,
    pub decision: Decision,
}

/// How a watchdog run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Devices matched and the watchdog is not continuous.
    Satisfied { checks: u64, devices: MatchResult },
    /// Stopped by a signal or an external cancel.
    Interrupted { checks: u64 },
}

/// Polls devices on a schedule, notifies on matches and optionally launches
/// a workload on the matched devices.
///
/// `RunState` is owned here and only mutated from the loop's own task.
pub struct Watchdog {
    policy: Policy,
    probe: Arc<dyn DeviceProbe>,
    notifier: Notifier,
    launcher: Option<Launcher>,
    state: RunState,
    shutdown: ShutdownGuard,
    status_tx: watch::Sender<WatchdogStatus>,
}

impl Watchdog {
    /// Create a watchdog. Returns it with a receiver that observes every phase change.
    pub fn new(
        policy: Policy,
        probe: Arc<dyn DeviceProbe>,
        notifier: Notifier,
        launcher: Option<Launcher>,
    ) -> (Self, watch::Receiver<WatchdogStatus>) {
        let (status_tx, status_rx) = watch::channel(WatchdogStatus::default());
        let watchdog = Self {
            policy,
            probe,
            notifier,
            launcher,
            state: RunState::default(),
            shutdown: ShutdownGuard::new(),
            status_tx,
        };
        (watchdog, status_rx)
    }

    pub fn shutdown(&self) -> &ShutdownGuard {
        &self.shutdown
    }

    /// Token that interrupts the watchdog when cancelled.
    pub fn token(&self) -> CancellationToken {
        self.shutdown.token()
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Check once now, then every `period` until a terminal condition.
    ///
    /// Only a probe failure aborts with an error; notification and launch
    /// failures are logged and the schedule goes on.
    pub async fn run(&mut self, period: Period) -> Result<RunOutcome, WatchdogError> {
        let interval = period.interval()?;

        if self.shutdown.is_cancelled() {
            self.terminate();
            return Ok(self.interrupted());
        }

        let first = self.cycle().await?;
        if first.decision == Decision::Stop {
            self.shutdown.token().cancel();
            return Ok(self.satisfied());
        }

        tracing::info!(%period, "watchdog scheduled");
        let scheduler = IntervalScheduler::new(self.shutdown.token());
        let exit = scheduler.run(interval, self).await?;
        self.terminate();

        Ok(match exit {
            ScheduleExit::Stopped => self.satisfied(),
            ScheduleExit::Cancelled => {
                tracing::info!(checks = self.state.check_count, "watchdog interrupted");
                self.interrupted()
            }
        })
    }

    /// One full check: sample, evaluate, react, decide.
    pub async fn cycle(&mut self) -> Result<CycleReport, WatchdogError> {
        let check = self.state.check_count;
        self.status_tx.send_modify(|s| s.last_error = None);
        self.set_phase(WatchdogPhase::Checking);
        tracing::info!(check, "checking devices");

        let snapshots = match self.probe.snapshot().await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(
                    check,
                    probe = self.probe.name(),
                    error = %e,
                    "device probe failed"
                );
                self.record_error(e.to_string());
                self.terminate();
                return Err(e.into());
            }
        };
        for device in &snapshots.devices {
            tracing::info!(check, "{}", device.display);
        }

        let matched = condition::evaluate(&snapshots, &self.policy);
        let mut report = CycleReport {
            check,
            matched: matched.clone(),
            notified: false,
            launched: None,
            decision: Decision::Continue,
        };

        self.set_phase(loop_control::after_check(&matched));
        if matched.is_empty() {
            tracing::info!(check, "no device satisfies the condition");
        } else {
            tracing::info!(check, devices = %matched, "devices satisfy the condition");
            if let Err(e) = self.react(&snapshots, &matched, &mut report).await {
                if !e.is_cycle_local() {
                    self.record_error(e.to_string());
                    self.terminate();
                    return Err(e);
                }
                self.log_reaction_failure(check, &e);
                self.record_error(e.to_string());
            }
        }

        self.state.check_count += 1;
        self.state.last_match = matched;

        self.set_phase(WatchdogPhase::Deciding);
        report.decision = loop_control::decide(&report.matched, self.policy.continuous);
        self.set_phase(loop_control::after_decision(report.decision));
        if report.decision == Decision::Stop {
            tracing::info!(check, "condition met, watchdog stopping");
        }
        Ok(report)
    }

    /// Notify, then launch. A failed push skips the launch for this cycle.
    async fn react(
        &self,
        snapshots: &SnapshotSet,
        matched: &MatchResult,
        report: &mut CycleReport,
    ) -> Result<(), WatchdogError> {
        self.notifier.notify(snapshots, matched, report.check).await?;
        report.notified = true;

        if let Some(launcher) = &self.launcher {
            report.launched = Some(launcher.launch(matched)?);
        }
        Ok(())
    }

    fn log_reaction_failure(&self, check: u64, error: &WatchdogError) {
        match error {
            WatchdogError::Notify(e) if e.is_credential_suspect() => {
                let identity = self.notifier.identity();
                tracing::error!(
                    check,
                    error = %e,
                    app_token = %identity.app_token,
                    uid = %identity.uid,
                    "push failed, check the app token and uid"
                );
            }
            WatchdogError::Notify(e) => tracing::error!(check, error = %e, "push failed"),
            WatchdogError::Launch(e) => {
                let command = self.launcher.as_ref().map(Launcher::command).unwrap_or_default();
                tracing::error!(check, command, error = %e, "preemption launch skipped");
            }
            other => tracing::error!(check, error = %other, "reaction failed"),
        }
    }

    fn set_phase(&mut self, phase: WatchdogPhase) {
        self.state.phase = phase;
        let check_count = self.state.check_count;
        let last_match = self.state.last_match.devices().to_vec();
        self.status_tx.send_modify(|s| {
            s.phase = phase;
            s.check_count = check_count;
            s.last_match = last_match;
        });
    }

    fn record_error(&self, error: String) {
        self.status_tx.send_modify(|s| s.last_error = Some(error));
    }

    fn terminate(&mut self) {
        self.set_phase(WatchdogPhase::Terminated);
    }

    fn satisfied(&self) -> RunOutcome {
        RunOutcome::Satisfied {
            checks: self.state.check_count,
            devices: self.state.last_match.clone(),
        }
    }

    fn interrupted(&self) -> RunOutcome {
        RunOutcome::Interrupted {
            checks: self.state.check_count,
        }
    }
}

#[async_trait::async_trait]
impl ScheduledJob for Watchdog {
    async fn fire(&mut self) -> Result<JobFlow, WatchdogError> {
        let report = self.cycle().await?;
        Ok(match report.decision {
            Decision::Continue => JobFlow::Continue,
            Decision::Stop => JobFlow::Stop,
        })
    }
}
