//! One-shot cancellation signal.

use std::sync::Arc;

use tokio::sync::watch;

/// A "done" signal that can be closed any number of times from any thread
/// and awaited from every blocking wait.
#[derive(Debug, Clone)]
pub struct DoneSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for DoneSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl DoneSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Close the signal. Idempotent.
    pub fn close(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so `wait_for` can only fail if it were dropped.
        let _ = rx.wait_for(|done| *done).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let done = DoneSignal::new();
        assert!(!done.is_closed());
        done.close();
        done.close();
        assert!(done.is_closed());
        done.closed().await;
    }

    #[tokio::test]
    async fn test_waiter_wakes_on_close() {
        let done = DoneSignal::new();
        let waiter = {
            let done = done.clone();
            tokio::spawn(async move { done.closed().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!waiter.is_finished());
        done.close();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
