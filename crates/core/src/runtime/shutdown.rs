use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Manages graceful shutdown via CancellationToken.
/// Listens for SIGINT and SIGTERM and cancels the token.
#[derive(Debug, Clone)]
pub struct ShutdownGuard {
    token: CancellationToken,
}

impl ShutdownGuard {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// The cancellation token the scheduler monitors.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Spawn a background task that listens for OS signals and triggers cancellation.
    pub fn spawn_signal_listener(&self) {
        let token = self.token.clone();
        tokio::spawn(async move {
            #[cfg(unix)]
            {
                use signal::unix::{signal as unix_signal, SignalKind};
                let (mut sigterm, mut sigint) = match (
                    unix_signal(SignalKind::terminate()),
                    unix_signal(SignalKind::interrupt()),
                ) {
                    (Ok(term), Ok(int)) => (term, int),
                    (Err(e), _) | (_, Err(e)) => {
                        tracing::warn!(error = %e, "failed to register signal handlers");
                        return;
                    }
                };
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, stopping watchdog"),
                    _ = sigint.recv() => tracing::info!("received SIGINT, stopping watchdog"),
                    _ = token.cancelled() => return,
                }
            }
            #[cfg(not(unix))]
            {
                tokio::select! {
                    _ = signal::ctrl_c() => tracing::info!("received Ctrl+C, stopping watchdog"),
                    _ = token.cancelled() => return,
                }
            }
            token.cancel();
        });
    }
}

impl Default for ShutdownGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_token() {
        let guard = ShutdownGuard::new();
        let other = guard.clone();
        assert!(!guard.is_cancelled());
        other.token().cancel();
        assert!(guard.is_cancelled());
    }

    #[tokio::test]
    async fn listener_exits_when_token_cancelled() {
        let guard = ShutdownGuard::new();
        guard.spawn_signal_listener();
        guard.token().cancel();
        tokio::task::yield_now().await;
        assert!(guard.is_cancelled());
    }
}
