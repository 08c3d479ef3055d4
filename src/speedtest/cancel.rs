//! Run-wide cancellation.
//!
//! The UI keeps a [`CancelHandle`]; the engine gets a [`CancelToken`].
//! Cancelling drops whatever future the token is guarding, which in turn
//! drops the in-flight HTTP request and closes its connection.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken { rx: self.tx.subscribe() }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the handle is cancelled. Never resolves if the
    /// handle is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Drive `fut` unless cancellation arrives first.
    pub async fn run_until_cancelled<F: Future>(&self, fut: F) -> Option<F::Output> {
        if self.is_cancelled() {
            return None;
        }

        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            output = fut => Some(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_future_completes_when_not_cancelled() {
        let handle = CancelHandle::new();
        let token = handle.token();

        assert_eq!(token.run_until_cancelled(async { 7 }).await, Some(7));
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_future() {
        let handle = CancelHandle::new();
        let token = handle.token();

        let canceller = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let outcome = token
            .run_until_cancelled(tokio::time::sleep(Duration::from_secs(30)))
            .await;
        assert!(outcome.is_none());
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_token_refuses_new_work() {
        let handle = CancelHandle::new();
        handle.cancel();

        let token = handle.token();
        assert!(token.is_cancelled());
        assert_eq!(token.run_until_cancelled(async { 1 }).await, None);
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_cancel() {
        let token = CancelHandle::new().token();

        let outcome = token
            .run_until_cancelled(async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                "done"
            })
            .await;
        assert_eq!(outcome, Some("done"));
    }
}
