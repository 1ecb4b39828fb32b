use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::WatchdogError;

/// Longest wait armed for a single fire. Longer periods are clamped so
/// deadline arithmetic on [`Instant`] cannot overflow.
pub const MAX_WAIT: Duration = Duration::from_secs(30 * 365 * 86_400);

/// What a fired job asks the scheduler to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFlow {
    Continue,
    /// Cancel the schedule from inside the job.
    Stop,
}

/// Why [`IntervalScheduler::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleExit {
    /// The job returned [`JobFlow::Stop`].
    Stopped,
    /// The schedule was cancelled from outside.
    Cancelled,
}

/// A unit of recurring work.
#[async_trait::async_trait]
pub trait ScheduledJob: Send {
    async fn fire(&mut self) -> Result<JobFlow, WatchdogError>;
}

/// Cancels a running schedule. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ScheduleHandle {
    token: CancellationToken,
}

impl ScheduleHandle {
    /// No further fire starts after this; an in-flight fire completes.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Fires one job at a fixed period on the calling task.
///
/// Fires never overlap: the next tick is awaited only after the job returns,
/// and ticks missed while a fire was running are skipped, not queued.
#[derive(Debug, Clone)]
pub struct IntervalScheduler {
    token: CancellationToken,
}

impl IntervalScheduler {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn handle(&self) -> ScheduleHandle {
        ScheduleHandle {
            token: self.token.clone(),
        }
    }

    /// Fire `job` every `period`, first one `period` from now.
    ///
    /// Job errors end the schedule and are returned. Periods above
    /// [`MAX_WAIT`] are clamped to it.
    pub async fn run<J>(&self, period: Duration, job: &mut J) -> Result<ScheduleExit, WatchdogError>
    where
        J: ScheduledJob + ?Sized,
    {
        if period > MAX_WAIT {
            tracing::warn!(
                requested_secs = period.as_secs(),
                clamped_secs = MAX_WAIT.as_secs(),
                "period too long, clamping"
            );
        }
        let period = period.min(MAX_WAIT);
        let mut next = deadline_after(Instant::now(), period);

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    tracing::debug!("schedule cancelled");
                    return Ok(ScheduleExit::Cancelled);
                }
                _ = sleep_until(next) => {}
            }

            match job.fire().await? {
                JobFlow::Continue => {}
                JobFlow::Stop => {
                    self.token.cancel();
                    return Ok(ScheduleExit::Stopped);
                }
            }

            let now = Instant::now();
            next = deadline_after(next, period);
            let mut skipped = 0u64;
            while next < now {
                next = deadline_after(next, period);
                skipped += 1;
            }
            if skipped > 0 {
                tracing::warn!(skipped, "check ran longer than the period, skipped missed fires");
            }
        }
    }
}

fn deadline_after(from: Instant, period: Duration) -> Instant {
    from.checked_add(period)
        .or_else(|| Instant::now().checked_add(period))
        .unwrap_or_else(Instant::now)
}
