//! Interruption of blocked calls
//!
//! An [`Interrupt`] plays the role of a signal delivered to whoever holds a
//! handle. Raising it makes the current blocking wait on that handle, or the
//! next one, give up with [`crate::DeviceError::Interrupted`]. Calls that do
//! not need to wait are not affected and leave the interrupt pending.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct Interrupt {
    pending: Arc<watch::Sender<bool>>,
}

impl Interrupt {
    #[must_use]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            pending: Arc::new(tx),
        }
    }

    /// Deliver the interrupt
    pub fn raise(&self) {
        self.pending.send_replace(true);
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        *self.pending.borrow()
    }

    /// Consume a pending interrupt, returning whether there was one
    pub(crate) fn take(&self) -> bool {
        self.pending.send_replace(false)
    }

    /// Resolves once the interrupt is pending, immediately if it already is
    pub(crate) async fn raised(&self) {
        let mut rx = self.pending.subscribe();
        // Err only if the sender is dropped, and we hold it
        let _ = rx.wait_for(|pending| *pending).await;
    }
}
