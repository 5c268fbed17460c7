use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

/// Fixed-capacity fan-out: at most `capacity` jobs run at once, and
/// [`WorkerPool::drain`] waits for every job ever spawned.
pub struct WorkerPool {
    capacity: usize,
    permits: Arc<Semaphore>,
    tasks: JoinSet<()>,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            capacity,
            permits: Arc::new(Semaphore::new(capacity)),
            tasks: JoinSet::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }

    /// Wait until a slot frees up, then start `job` in it.
    pub async fn spawn<F>(&mut self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .expect("worker pool semaphore is never closed");
        self.tasks.spawn(async move {
            let _permit = permit;
            job.await;
        });
        while let Some(done) = self.tasks.try_join_next() {
            log_failure(done);
        }
    }

    /// Wait for every spawned job to finish.
    pub async fn drain(mut self) {
        while let Some(done) = self.tasks.join_next().await {
            log_failure(done);
        }
    }
}

fn log_failure(done: Result<(), tokio::task::JoinError>) {
    if let Err(e) = done {
        warn!("worker task failed: {e}");
    }
}
