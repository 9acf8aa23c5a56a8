//! Error join primitive for concurrently running actions.
//!
//! An [`ErrorWaitGroup`] is sized up front with the number of outcomes it
//! will receive. Each worker gets a [`DoneHandle`] and reports through it
//! exactly once; the orchestrating task then blocks in [`ErrorWaitGroup::wait`]
//! or [`ErrorWaitGroup::wait_for`] until every outcome has arrived.
//!
//! ```text
//!   worker 0 ──done(Ok)──┐
//!   worker 1 ──done(Err)─┼──► [ bounded channel, cap n ] ──► wait() → first Err
//!   worker 2 ──done(Ok)──┘
//! ```
//!
//! Only the **first** error is returned; later errors are discarded. The
//! group never cancels workers: a timeout only stops the waiting side.

use crate::error::{Error, Result};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Fan-in barrier that returns the first error reported by `n` workers.
#[derive(Debug)]
pub struct ErrorWaitGroup {
    size: usize,
    tx: mpsc::Sender<Result<()>>,
    rx: mpsc::Receiver<Result<()>>,
}

impl ErrorWaitGroup {
    /// Creates a wait group expecting exactly `size` outcomes.
    #[must_use]
    pub fn new(size: usize) -> Self {
        // tokio channels need a non-zero buffer; a zero-sized group never sends.
        let (tx, rx) = mpsc::channel(size.max(1));
        Self { size, tx, rx }
    }

    /// Number of outcomes this group waits for.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns a handle a worker uses to report its outcome.
    ///
    /// Callers must hand out exactly `size` handles.
    #[must_use]
    pub fn handle(&self) -> DoneHandle {
        DoneHandle {
            tx: Some(self.tx.clone()),
        }
    }

    /// Blocks until all outcomes arrived and returns the first error, if any.
    ///
    /// Returns immediately for a zero-sized group. Blocks forever if fewer
    /// than `size` outcomes are ever reported while handles are alive.
    pub async fn wait(mut self) -> Result<()> {
        if self.size == 0 {
            return Ok(());
        }

        let mut first: Option<Error> = None;
        for received in 0..self.size {
            // The group holds its own sender, so the channel cannot close here.
            let Some(outcome) = self.rx.recv().await else {
                return Err(Error::Internal(format!(
                    "wait group closed after {received} of {} outcomes",
                    self.size
                )));
            };
            if let Err(err) = outcome {
                match first {
                    None => first = Some(err),
                    Some(_) => tracing::debug!(error = %err, "discarding subsequent error"),
                }
            }
        }

        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Same as [`wait`](Self::wait) but gives up after `timeout`.
    ///
    /// The deadline covers the whole wait. On timeout the outstanding
    /// workers keep running; cancelling them is the caller's job.
    pub async fn wait_for(self, timeout: Duration) -> Result<()> {
        let size = self.size;
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                operation: format!("waiting for {size} outcomes"),
                duration: timeout,
            }),
        }
    }
}

/// Single-use reporting handle for one worker.
///
/// Reporting consumes the handle. A handle dropped without reporting (for
/// example because its worker panicked) reports [`Error::WorkerLost`].
#[derive(Debug)]
pub struct DoneHandle {
    tx: Option<mpsc::Sender<Result<()>>>,
}

impl DoneHandle {
    /// Reports this worker's outcome.
    pub fn done(mut self, outcome: Result<()>) {
        if let Some(tx) = self.tx.take() {
            deliver(&tx, outcome);
        }
    }
}

impl Drop for DoneHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            deliver(&tx, Err(Error::WorkerLost));
        }
    }
}

fn deliver(tx: &mpsc::Sender<Result<()>>, outcome: Result<()>) {
    match tx.try_send(outcome) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            tracing::warn!("wait group received more outcomes than its capacity; dropping one");
        }
        Err(TrySendError::Closed(_)) => {
            tracing::debug!("wait group no longer waiting; outcome dropped");
        }
    }
}
