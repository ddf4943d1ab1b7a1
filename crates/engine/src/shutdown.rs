//! Ordered shutdown coordination (spec.md §5).
//!
//! On SIGINT/SIGTERM, the loop stops admitting new opportunities first,
//! then lets in-flight executions and rebalances drain, and only then tears
//! down book subscriptions and the storage handle. A bare `Arc<AtomicBool>`
//! is enough to stop a poll loop but not to sequence drains across
//! components, so this wraps a `CancellationToken` hierarchy instead.

use tokio_util::sync::CancellationToken;

/// Root shutdown signal plus the ordered child tokens components check.
///
/// `cancel()` fires `accepting_new` first; callers that still have
/// in-flight work should finish it, then drop their clone of `draining`
/// once done. The process exits once `draining` is cancelled and every
/// clone has been dropped (signalled by awaiting `token.cancelled()` on a
/// `Weak`-tracked count, or more simply, by a bounded grace period).
pub struct ShutdownCoordinator {
    accepting_new: CancellationToken,
    draining: CancellationToken,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self { accepting_new: CancellationToken::new(), draining: CancellationToken::new() }
    }

    /// Token the detection/admission loop polls; once cancelled it stops
    /// pulling new opportunities but existing executions keep running.
    #[must_use]
    pub fn accepting_new_token(&self) -> CancellationToken {
        self.accepting_new.clone()
    }

    /// Token the final teardown (book unsubscribe, store close) waits on.
    #[must_use]
    pub fn draining_token(&self) -> CancellationToken {
        self.draining.clone()
    }

    /// Step 1: stop admitting new opportunities.
    pub fn begin_shutdown(&self) {
        self.accepting_new.cancel();
    }

    /// Step 2: in-flight work has drained; safe to tear down connections.
    pub fn finish_draining(&self) {
        self.draining.cancel();
    }

    /// Waits for a process-level SIGINT and runs the two-step sequence,
    /// giving in-flight executions up to `drain_grace` to finish before
    /// forcing the drain token regardless.
    pub async fn run_until_ctrl_c(&self, drain_grace: std::time::Duration) {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("failed to install ctrl-c handler, shutting down immediately");
        } else {
            tracing::info!("received shutdown signal, draining in-flight work");
        }
        self.begin_shutdown();
        tokio::time::sleep(drain_grace).await;
        self.finish_draining();
    }
}
