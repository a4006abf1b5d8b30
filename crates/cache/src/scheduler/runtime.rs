//! Tokio-backed scheduler

use super::{HostScheduler, Task, TimerHandle};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::Notify;

/// Scheduler running timers and async persists on a Tokio runtime
///
/// Timers are spawned tasks sleeping on `tokio::time`, so a paused test
/// clock drives them. Async work goes to the blocking pool because persist
/// callbacks are synchronous and may block on I/O.
///
/// Clones share the accepting flag and the in-flight count: keep one to call
/// [`shutdown`](Self::shutdown) and [`drain`](Self::drain) when stopping.
///
/// The scheduler cannot tell when the runtime itself goes away. Tasks handed
/// to a runtime that is shutting down are dropped without running, so call
/// `shutdown` and flush the cache while the runtime is still up.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
    accepting: Arc<AtomicBool>,
    in_flight: Arc<InFlight>,
}

/// Fired timers and async tasks that have not finished yet
#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// Counts one task in flight until dropped, panicking or not
struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn enter(in_flight: &Arc<InFlight>) -> Self {
        in_flight.count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(in_flight))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl TokioScheduler {
    /// Scheduler on the given runtime
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            accepting: Arc::new(AtomicBool::new(true)),
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Scheduler on the runtime the caller is running in
    pub fn try_current() -> Result<Self, TryCurrentError> {
        Ok(Self::new(Handle::try_current()?))
    }

    /// Stop accepting deferred and async work
    ///
    /// Later persists run inline on the caller's thread.
    pub fn shutdown(&self) {
        if self.accepting.swap(false, Ordering::SeqCst) {
            tracing::debug!("Scheduler stopped accepting work");
        }
    }

    /// Number of fired timers and async tasks not yet finished
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Wait until every fired timer and every task handed to
    /// [`run_async`](HostScheduler::run_async) has finished
    ///
    /// Call after [`shutdown`](Self::shutdown) and flushing the cache. A timer
    /// counts as in flight from the moment it wakes, so one racing the flush
    /// is either waited for here or finds its work already taken.
    pub async fn drain(&self) {
        loop {
            let idle = self.in_flight.idle.notified();
            tokio::pin!(idle);
            // Register before checking so a wakeup in between is not missed
            idle.as_mut().enable();

            let remaining = self.in_flight();
            if remaining == 0 {
                return;
            }
            tracing::debug!("Waiting for {} in-flight persists", remaining);
            idle.await;
        }
    }
}

impl HostScheduler for TokioScheduler {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn schedule_after(&self, delay: Duration, task: Task) -> TimerHandle {
        let in_flight = Arc::clone(&self.in_flight);
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let _guard = InFlightGuard::enter(&in_flight);
            task();
        });
        let abort = join.abort_handle();
        TimerHandle::new(move || abort.abort())
    }

    fn run_async(&self, task: Task) {
        let guard = InFlightGuard::enter(&self.in_flight);
        // Detached; the guard tracks completion
        drop(self.handle.spawn_blocking(move || {
            let _guard = guard;
            task();
        }));
    }

    fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }
}
