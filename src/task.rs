use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// A spawned background loop plus the token that asks it to stop.
///
/// Stopping is two steps: [`TaskHandle::signal`] is cooperative and returns
/// immediately; [`TaskHandle::join`] waits until the task has really exited.
pub struct TaskHandle<T = ()> {
    cancel: CancellationToken,
    task: JoinHandle<T>,
}

impl<T: Send + 'static> TaskHandle<T> {
    /// Spawn `body` with a fresh token it is expected to watch.
    pub fn spawn<F, Fut>(body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(body(cancel.clone()));
        Self { cancel, task }
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn signal(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to exit. `None` if it panicked.
    pub async fn join(mut self) -> Option<T> {
        self.wait().await
    }

    /// Like [`TaskHandle::join`] but borrows the handle, so dropping the
    /// returned future leaves the task running and still owned here. Must
    /// not be called again once it has returned.
    pub async fn wait(&mut self) -> Option<T> {
        match (&mut self.task).await {
            Ok(out) => Some(out),
            Err(e) => {
                warn!("background task ended abnormally: {e}");
                None
            }
        }
    }

    /// Signal, then join.
    pub async fn shutdown(self) -> Option<T> {
        self.signal();
        self.join().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn shutdown_waits_for_the_body_to_finish() {
        let exited = Arc::new(AtomicBool::new(false));
        let flag = exited.clone();
        let handle = TaskHandle::spawn(|cancel| async move {
            cancel.cancelled().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
            flag.store(true, Ordering::SeqCst);
            7
        });
        assert_eq!(handle.shutdown().await, Some(7));
        assert!(exited.load(Ordering::SeqCst));
    }
}
