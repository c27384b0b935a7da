//! Per-request cancellation token.

use tokio::sync::watch;

/// Owning side of a cancellation token.
///
/// Held by the inbound transport; dropping the handle without calling
/// [`CancelHandle::cancel`] leaves the token permanently un-cancelled.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Create a linked handle/token pair.
    pub fn new() -> (CancelHandle, Cancellation) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, Cancellation { rx: Some(rx) })
    }

    /// Fire the cancellation. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Cloneable cancellation token observed at every suspension point.
#[derive(Debug, Clone)]
pub struct Cancellation {
    /// None means "never cancelled" (no handle was ever wired up).
    rx: Option<watch::Receiver<bool>>,
}

impl Cancellation {
    /// A token that never fires, for callers without a cancel path.
    pub fn none() -> Self {
        Self { rx: None }
    }

    /// Whether the cancel has already fired.
    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolve once the cancel fires. Never resolves for an unwired token
    /// or when the handle is dropped without cancelling.
    pub async fn cancelled(&self) {
        match &self.rx {
            Some(rx) => {
                let mut rx = rx.clone();
                if *rx.borrow() {
                    return;
                }
                if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                    // Handle dropped without cancelling; stay pending.
                    std::future::pending::<()>().await;
                }
            }
            None => std::future::pending::<()>().await,
        }
    }
}
