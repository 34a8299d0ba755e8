//! Graceful shutdown coordination.
//!
//! One [`CancellationToken`] fans the signal out to the HTTP listener and every
//! WebSocket session; a [`TaskTracker`] lets shutdown wait for those sessions
//! to finish.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TrackedFuture;
use tracing::{info, warn};

/// Default time allowed for sessions to drain.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Coordinates shutdown across the listener and its sessions.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    sessions: TaskTracker,
}

impl ShutdownCoordinator {
    /// Create a coordinator that has not been triggered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A clone of the root cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wrap a session future so shutdown waits for it.
    pub fn track<F: Future>(&self, session: F) -> TrackedFuture<F> {
        self.sessions.track_future(session)
    }

    /// Number of tracked sessions still running.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Signal shutdown without waiting.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been signalled.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Signal shutdown and wait up to `timeout` for tracked sessions to end.
    ///
    /// Returns `false` if sessions were still running when the timeout hit.
    pub async fn graceful_shutdown(&self, timeout: Option<Duration>) -> bool {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        self.shutdown();
        let _ = self.sessions.close();
        info!(
            sessions = self.session_count(),
            timeout_secs = timeout.as_secs(),
            "waiting for sessions to drain"
        );
        if tokio::time::timeout(timeout, self.sessions.wait()).await.is_err() {
            warn!(remaining = self.session_count(), "shutdown timed out after {timeout:?}");
            return false;
        }
        true
    }
}
