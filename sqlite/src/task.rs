//! Running blocking SQLite work from async callers.
//!
//! Work runs on tokio's blocking pool. While it runs, the caller's
//! [`CancellationToken`] is watched; when it fires, the connection's
//! [`InterruptHandle`] aborts the statement in flight and the outcome
//! becomes [`StoreError::Cancelled`].
//!
//! If the calling future is dropped, the blocking work still runs to
//! completion. Anything the closure owns (a lock guard, a transaction) is
//! released when it finishes.

use rusqlite::{Connection, InterruptHandle};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, StoreError};

/// Handed to blocking work so it can expose its connection to cancellation.
pub(crate) struct Interruptible {
    handle: Option<oneshot::Sender<InterruptHandle>>,
    cancel: CancellationToken,
}

impl Interruptible {
    /// Registers `conn` as the target of interrupts. Only the first call
    /// has an effect.
    pub(crate) fn arm(&mut self, conn: &Connection) {
        if let Some(tx) = self.handle.take() {
            let _ = tx.send(conn.get_interrupt_handle());
        }
    }

    /// Fails with [`StoreError::Cancelled`] once the token has fired.
    pub(crate) fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        Ok(())
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Runs `work` on the blocking pool, interrupting it if `cancel` fires.
pub(crate) async fn run_blocking<T, F>(cancel: &CancellationToken, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Interruptible) -> Result<T> + Send + 'static,
{
    if cancel.is_cancelled() {
        return Err(StoreError::Cancelled);
    }

    let (handle_tx, handle_rx) = oneshot::channel();
    let mut ctx = Interruptible {
        handle: Some(handle_tx),
        cancel: cancel.clone(),
    };
    let mut task = tokio::task::spawn_blocking(move || work(&mut ctx));

    let joined = tokio::select! {
        joined = &mut task => joined,
        _ = cancel.cancelled() => {
            // The handle arrives once the work has opened its connection;
            // a closed channel means it never did.
            if let Ok(handle) = handle_rx.await {
                debug!("Interrupting store operation");
                handle.interrupt();
            }
            task.await
        }
    };

    match joined? {
        Err(e) if cancel.is_cancelled() && e.is_interrupted() => Err(StoreError::Cancelled),
        other => other,
    }
}
