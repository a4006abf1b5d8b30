//! Host scheduling primitives
//!
//! The cache never creates threads. Everything it defers goes through a
//! [`HostScheduler`]: run after a delay, run off the calling thread, and a
//! query for whether the host still accepts either.

mod manual;
mod runtime;

pub use manual::ManualScheduler;
pub use runtime::TokioScheduler;

use std::fmt;
use std::time::{Duration, Instant};

/// Unit of deferred work
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Scheduling capability injected into the cache
pub trait HostScheduler: Send + Sync + 'static {
    /// Current time on the scheduler's clock
    fn now(&self) -> Instant;

    /// Run `task` once `delay` has elapsed on the scheduler's clock
    fn schedule_after(&self, delay: Duration, task: Task) -> TimerHandle;

    /// Run `task` off the calling thread
    fn run_async(&self, task: Task);

    /// Whether deferred and async work will still run
    ///
    /// Returns false once the host is shutting down; the cache then runs
    /// persists inline so nothing is dropped.
    fn is_accepting(&self) -> bool;
}

/// Handle to a timer returned by [`HostScheduler::schedule_after`]
///
/// Cancelling is best effort. A timer that already started running is not
/// stopped, so callers must still check that the work is wanted when it fires.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send + Sync + 'static>>,
}

impl TimerHandle {
    /// Handle that runs `cancel` when cancelled
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Handle with no way to cancel the timer
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    /// Stop the timer if it has not fired yet
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}
