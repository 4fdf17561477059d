//! Cooperative cancellation of streaming consumers.

use std::time::Duration;

use tokio::{task::JoinHandle, time};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One-shot cancellation controller for a queue generation.
///
/// The controller has two states, armed and cancelled, and the transition is
/// permanent. Signaling is synchronous and idempotent; the delayed variant runs
/// on a background task whose handle can be awaited or aborted before the
/// signal fires.
#[derive(Debug)]
pub(crate) struct CancellationController {
    /// The token observed by the streaming consumer.
    token: CancellationToken,
}

impl CancellationController {
    /// Creates a new controller in the armed state.
    pub(crate) fn new() -> Self {
        CancellationController {
            token: CancellationToken::new(),
        }
    }

    /// Signals cancellation.
    ///
    /// The transition happens before this function returns. Signaling an
    /// already-cancelled controller is a no-op.
    pub(crate) fn cancel(&self) {
        if !self.token.is_cancelled() {
            debug!("cancellation signaled");
        }
        self.token.cancel();
    }

    /// Schedules cancellation after `delay` on a background task.
    ///
    /// Returns immediately. The returned handle resolves once the signal has
    /// fired; aborting it before that leaves the controller armed.
    pub(crate) fn cancel_after(&self, delay: Duration) -> JoinHandle<()> {
        let token = self.token.clone();

        tokio::spawn(async move {
            time::sleep(delay).await;
            if !token.is_cancelled() {
                debug!(?delay, "delayed cancellation fired");
            }
            token.cancel();
        })
    }

    /// Returns whether cancellation has been signaled.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Waits until cancellation is signaled.
    ///
    /// Completes immediately if the controller is already cancelled.
    pub(crate) async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::CancellationController;

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let controller = CancellationController::new();
        assert!(!controller.is_cancelled());

        controller.cancel();
        controller.cancel();

        assert!(controller.is_cancelled());
        // Waiting on an already-cancelled controller completes immediately.
        controller.cancelled().await;
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_cancel_fires_after_delay() {
        let controller = CancellationController::new();
        let timer = controller.cancel_after(Duration::from_millis(100));

        assert!(!controller.is_cancelled());

        timer.await.expect("timer task panicked");
        assert!(controller.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_timer_leaves_controller_armed() {
        let controller = CancellationController::new();
        let timer = controller.cancel_after(Duration::from_secs(10));

        timer.abort();
        assert!(timer.await.unwrap_err().is_cancelled());

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(!controller.is_cancelled());
    }
}
