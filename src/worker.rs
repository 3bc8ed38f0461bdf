//! Shared bounded worker pool for blocking mount I/O.
//!
//! Every poll fetch and trajectory upload runs as one unit on the tokio runtime, gated by
//! a semaphore so a stalled mount cannot pile up an unbounded number of in-flight
//! exchanges.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Default number of concurrent worker units
pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Units that could start right now without waiting for a permit
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Submit a unit of work; it starts as soon as a permit is free.
    pub fn submit<F>(&self, work: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            // The semaphore is never closed, so acquire only fails if that changes.
            let _permit = permits.acquire_owned().await;
            work.await
        })
    }
}
