//! Cooperative cancellation for runs and loops.

use tokio::sync::watch;

use stockflow_core::{Error, Result};

/// Shutdown handle shared by every run and loop in the process.
///
/// Runs poll it with [`check`](CancelToken::check) at stage boundaries;
/// the scheduler and sensor loops await [`cancelled`](CancelToken::cancelled)
/// inside their `select!`s. Cancelling is one-way and sticky.
pub struct CancelToken {
    tx: std::sync::Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: std::sync::Arc::new(tx),
            rx,
        }
    }

    /// Signal shutdown to every clone of this token.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once [`cancel`](CancelToken::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Error out of a run at a stage boundary once shutdown has started.
    pub fn check(&self, run_key: &str) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::cancelled(format!("run {run_key} stopped by shutdown")))
        } else {
            Ok(())
        }
    }
}

impl Clone for CancelToken {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_is_shared_across_clones() {
        let token = CancelToken::new();
        let clone = token.clone();

        assert!(!clone.is_cancelled());
        assert!(clone.check("prefix/stock_1.csv").is_ok());

        token.cancel();

        assert!(clone.is_cancelled());
        let err = clone.check("prefix/stock_1.csv").unwrap_err();
        assert!(matches!(err, Error::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let token = CancelToken::new();
        let waiter = token.clone();

        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });

        token.cancel();
        handle.await.unwrap();

        // Resolves immediately when already cancelled.
        token.cancelled().await;
    }
}
