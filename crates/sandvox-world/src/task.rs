//! Minimal handle over a background computation.
//!
//! Engines schedule at most one job per target and poll it once per update
//! tick; an edit that would race a running job calls
//! [`complete`](TaskHandle::complete) to finish it synchronously first.
//! Jobs are always finite (BFS over a bounded graph, fixed-size scans), so
//! completion is bounded.

use std::thread::JoinHandle;

/// A handle to a computation running on a background thread.
pub struct TaskHandle<T> {
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> TaskHandle<T> {
    /// Spawns `work` on a new thread and returns immediately.
    pub fn spawn<F>(work: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self {
            handle: std::thread::spawn(work),
        }
    }

    /// Returns `true` once the computation has finished.
    pub fn is_done(&self) -> bool {
        self.handle.is_finished()
    }

    /// Blocks until the computation finishes and returns its result.
    ///
    /// A panic on the worker thread is resumed on the calling thread.
    pub fn complete(self) -> T {
        match self.handle.join() {
            Ok(value) => value,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
