//! Cooperative cancellation for store-bound operations.

use std::future::Future;

use tokio::sync::watch;

use crate::error::DomainError;

/// Fires a [`CancelSignal`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancels every signal created from this handle.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Cancellation signal accepted by replay, append and seed operations.
///
/// Dropping the [`CancelHandle`] without cancelling leaves the signal
/// un-fired forever.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// A signal that never fires.
    #[must_use]
    pub const fn never() -> Self {
        Self { rx: None }
    }

    /// Creates a connected handle/signal pair.
    #[must_use]
    pub fn pair() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, Self { rx: Some(rx) })
    }

    /// Returns `true` once the handle has cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Completes when the signal fires.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Runs `operation` unless the signal fires first. A future that loses
    /// the race is dropped, never polled to completion.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Cancelled` if the signal fired before
    /// `operation` completed.
    pub async fn guard<F: Future>(&self, operation: F) -> Result<F::Output, DomainError> {
        if self.is_cancelled() {
            return Err(DomainError::Cancelled);
        }
        tokio::select! {
            biased;
            () = self.cancelled() => Err(DomainError::Cancelled),
            output = operation => Ok(output),
        }
    }
}
