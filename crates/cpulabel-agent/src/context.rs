//! Invocation context for a reconciliation pass

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Deadline and cancellation signal handed to a pass by whoever triggers it
#[derive(Debug, Clone)]
pub struct ReconcileContext {
    deadline: Option<Instant>,
    cancel: watch::Receiver<bool>,
}

/// Cancels every context created from it
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Signal cancellation
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// A fresh context tied to this handle
    pub fn context(&self) -> ReconcileContext {
        ReconcileContext {
            deadline: None,
            cancel: self.tx.subscribe(),
        }
    }
}

impl ReconcileContext {
    /// A context together with the handle that cancels it
    pub fn new() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                deadline: None,
                cancel: rx,
            },
            CancelHandle { tx },
        )
    }

    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        let (ctx, _handle) = Self::new();
        ctx
    }

    /// Set the deadline `timeout` from now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Whether the deadline has already passed
    pub fn is_expired(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }

    /// Resolves once cancellation is signalled. Never resolves if the
    /// handle is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Resolves when the deadline passes. Never resolves without a deadline.
    pub async fn deadline_reached(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }
}
