use std::future::Future;

use tokio::task::{JoinError, JoinHandle};

/// Spawned task that is aborted when its owner goes away
pub(crate) struct AbortOnDrop<T>(Option<JoinHandle<T>>);

impl<T: Send + 'static> AbortOnDrop<T> {
    pub(crate) fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self(Some(tokio::spawn(future)))
    }

    /// Placeholder for a task that is started later
    pub(crate) fn empty() -> Self {
        Self(None)
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.0.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the task; `None` once it has been joined before
    ///
    /// Cancel safe: dropping the future leaves the task running.
    pub(crate) async fn join(&mut self) -> Option<Result<T, JoinError>> {
        let handle = self.0.as_mut()?;
        let result = handle.await;
        self.0 = None;
        Some(result)
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        if let Some(handle) = &self.0 {
            handle.abort();
        }
    }
}
