//! Long-running management operations.
//!
//! Job create, delete, start and stop run in their own task. The caller gets an `Operation` back,
//! which is a pair of one-shot receivers: one for the result and one for the error. The task also
//! watches a cancellation channel whose sending half (`CancelGuard`) stays with the caller, so when
//! the caller returns early, for any reason, the guard is dropped and the task stops.

use crate::error::{Error, Result};
use futures::future::FutureExt;
use std::future::Future;
use tokio::{select, sync::oneshot};

/// Caller half of a cancellation channel. Dropping it cancels the operation it was handed to.
#[derive(Debug)]
pub struct CancelGuard {
    _tx: oneshot::Sender<()>,
}

/// Operation half of a cancellation channel.
#[derive(Debug)]
pub struct CancelSignal {
    rx: oneshot::Receiver<()>,
}

pub fn cancellation() -> (CancelGuard, CancelSignal) {
    let (tx, rx) = oneshot::channel();
    (CancelGuard { _tx: tx }, CancelSignal { rx })
}

#[derive(Debug)]
pub struct Operation<T> {
    response: oneshot::Receiver<T>,
    error: oneshot::Receiver<Option<Error>>,
}

impl<T: Send + 'static> Operation<T> {
    /// Runs `task` in the background until it finishes or `cancel` fires.
    pub fn spawn<F>(cancel: CancelSignal, task: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let (response_tx, response) = oneshot::channel();
        let (error_tx, error) = oneshot::channel();
        tokio::spawn(async move {
            let cancelled = cancel.rx.fuse();
            let task = task.fuse();
            select! {
                // the guard was dropped (or fired) before the task completed
                _ = cancelled => {
                    let _ = error_tx.send(Some(Error::Cancelled));
                }
                result = task => match result {
                    Ok(value) => {
                        let _ = response_tx.send(value);
                        let _ = error_tx.send(None);
                    }
                    Err(err) => {
                        let _ = error_tx.send(Some(err));
                    }
                }
            }
        });
        Self { response, error }
    }

    /// An operation that already failed before anything was sent to the remote side.
    pub fn failed(err: Error) -> Self {
        let (_, response) = oneshot::channel();
        let (error_tx, error) = oneshot::channel();
        let _ = error_tx.send(Some(err));
        Self { response, error }
    }

    /// Waits for the operation: the error signal first, then the result if there was no error.
    pub async fn wait(self) -> Result<T> {
        match self.error.await {
            Ok(Some(err)) => return Err(err),
            Ok(None) => {}
            Err(_) => return Err(Error::OperationAbandoned),
        }
        self.response.await.map_err(|_| Error::OperationAbandoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn completed_operation_yields_result() {
        let (_guard, signal) = cancellation();
        let op = Operation::spawn(signal, async { Ok(7) });
        assert_eq!(op.wait().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn failed_operation_yields_error() {
        let (_guard, signal) = cancellation();
        let op: Operation<()> =
            Operation::spawn(signal, async { Err(Error::api(409, "Conflict", "busy")) });
        let err = op.wait().await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 409, .. }));
    }

    #[tokio::test]
    async fn dropping_guard_cancels_pending_operation() {
        let (guard, signal) = cancellation();
        let (finished_tx, mut finished_rx) = oneshot::channel::<()>();
        let op = Operation::spawn(signal, async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            let _ = finished_tx.send(());
            Ok(())
        });
        drop(guard);
        assert!(matches!(op.wait().await, Err(Error::Cancelled)));
        // the task stopped without running to completion
        assert!(finished_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_constructor_reports_error() {
        let op: Operation<()> = Operation::failed(Error::MissingField("id"));
        assert!(matches!(op.wait().await, Err(Error::MissingField("id"))));
    }
}
