//! Graceful shutdown signal: once triggered, new settlement calls fail with
//! a shutting-down error and already-queued work drains up to a bounded
//! timeout.
//!
//! Ctrl-C / SIGTERM collapse into a single [`CancellationToken`] so the same
//! token both tells Axum to stop accepting connections and tells every
//! network's [`x402x_evm::SignerPool`] to start rejecting new work and
//! draining what's already queued.

use std::time::Duration;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Listens for Ctrl-C / SIGTERM (Unix) and cancels a shared token once.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tracker: TaskTracker,
    token: CancellationToken,
}

impl ShutdownSignal {
    /// Installs the OS signal handlers and starts listening immediately.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the Unix signal handlers cannot be installed.
    pub fn try_new() -> std::io::Result<Self> {
        let token = CancellationToken::new();
        let watched = token.clone();
        let tracker = TaskTracker::new();

        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            tracker.spawn(async move {
                tokio::select! {
                    _ = signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
                watched.cancel();
            });
        }
        #[cfg(not(unix))]
        {
            tracker.spawn(async move {
                let _ = signal::ctrl_c().await;
                watched.cancel();
            });
        }
        tracker.close();

        Ok(Self { tracker, token })
    }

    /// The token to pass to every component that needs to observe shutdown
    /// (Axum's graceful-shutdown future, every [`x402x_evm::SignerPool`]).
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Resolves once a shutdown signal has been received.
    pub async fn recv(&self) {
        self.token.cancelled().await;
        self.tracker.wait().await;
    }

    /// Cancels `token()` and waits up to `timeout` for in-flight work to
    /// finish via `drain`, returning whether the drain completed in time.
    pub async fn drain(token: &CancellationToken, drain: impl std::future::Future<Output = ()>, timeout: Duration) -> bool {
        token.cancel();
        tokio::time::timeout(timeout, drain).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_reports_timeout_when_future_never_resolves() {
        let token = CancellationToken::new();
        let completed = ShutdownSignal::drain(&token, std::future::pending::<()>(), Duration::from_millis(10)).await;
        assert!(!completed);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn drain_reports_success_when_future_resolves_in_time() {
        let token = CancellationToken::new();
        let completed = ShutdownSignal::drain(&token, async {}, Duration::from_secs(1)).await;
        assert!(completed);
    }
}
