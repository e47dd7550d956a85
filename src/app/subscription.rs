//! Cancellable ownership of spawned listeners and timers.

use std::sync::Mutex;
use tokio::task::{AbortHandle, JoinHandle};

/// Aborts every registered task when disposed or dropped
#[derive(Debug, Default)]
pub struct Disposer {
    handles: Mutex<Vec<AbortHandle>>,
}

impl Disposer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a spawned task
    pub fn track<T>(&self, handle: JoinHandle<T>) {
        self.push(handle.abort_handle());
    }

    pub fn push(&self, handle: AbortHandle) {
        let mut handles = self.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Number of tasks still running
    pub fn active(&self) -> usize {
        self.lock().iter().filter(|h| !h.is_finished()).count()
    }

    pub fn dispose(&self) {
        for handle in self.lock().drain(..) {
            handle.abort();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AbortHandle>> {
        self.handles
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        self.dispose();
    }
}
