//! Bounded pool for CPU-bound work.

use std::sync::Arc;

use internmatch_core::{Error, Result};
use tokio::sync::Semaphore;
use tokio::task;

/// Runs blocking closures on tokio's blocking threads, at most `max_concurrent` at a time.
#[derive(Clone, Debug)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl WorkerPool {
    /// Create a pool admitting `max_concurrent` jobs at once (at least one).
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Maximum number of concurrent jobs.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Number of permits currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Run `job` on a blocking thread once a permit is free and await its result.
    ///
    /// # Errors
    /// Returns an error if the pool is closed or the job panics
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|error| Error::Other(format!("Worker pool closed: {error}")))?;

        task::spawn_blocking(move || {
            let output = job();
            drop(permit);
            output
        })
        .await
        .map_err(|error| Error::Other(format!("Worker task failed: {error}")))
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(4)
    }
}
