//! Manually driven scheduler with a virtual clock

use super::{HostScheduler, Task, TimerHandle};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Timer key: (deadline as offset from origin, insertion sequence)
type TimerKey = (Duration, u64);

/// Deterministic scheduler for tests and simulations
///
/// Time only moves when [`advance`](Self::advance) or
/// [`advance_clock`](Self::advance_clock) is called. Async tasks are queued
/// and run by [`run_until_idle`](Self::run_until_idle) (which `advance` calls
/// for you). Tasks always run with no internal lock held, so they may schedule
/// more work.
#[derive(Clone)]
pub struct ManualScheduler {
    state: Arc<Mutex<ManualState>>,
}

struct ManualState {
    origin: Instant,
    elapsed: Duration,
    next_seq: u64,
    timers: BTreeMap<TimerKey, Task>,
    queue: VecDeque<Task>,
    accepting: bool,
}

impl ManualScheduler {
    /// Scheduler whose clock starts now
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                origin: Instant::now(),
                elapsed: Duration::ZERO,
                next_seq: 0,
                timers: BTreeMap::new(),
                queue: VecDeque::new(),
                accepting: true,
            })),
        }
    }

    /// Time elapsed on the virtual clock since creation
    pub fn elapsed(&self) -> Duration {
        self.state.lock().elapsed
    }

    /// Move the clock forward by `by`, firing due timers in deadline order
    ///
    /// Each timer sees the clock at its own deadline. Async tasks queued before
    /// the call run first, at the current time; tasks queued by a timer run
    /// right after it.
    pub fn advance(&self, by: Duration) {
        self.run_until_idle();
        let target = self.state.lock().elapsed + by;

        loop {
            let task = {
                let mut state = self.state.lock();
                let next = state.timers.keys().next().copied();
                let due = match next {
                    Some(key) if key.0 <= target => key,
                    _ => {
                        state.elapsed = target;
                        break;
                    }
                };
                state.elapsed = state.elapsed.max(due.0);
                state.timers.remove(&due)
            };

            if let Some(task) = task {
                task();
            }
            self.run_until_idle();
        }
    }

    /// Move the clock forward without firing anything
    ///
    /// Simulates a timer that is late: its deadline passes but it has not run.
    pub fn advance_clock(&self, by: Duration) {
        self.state.lock().elapsed += by;
    }

    /// Run queued async tasks until the queue is empty
    ///
    /// Returns the number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.state.lock().queue.pop_front();
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Number of timers that have neither fired nor been cancelled
    pub fn pending_timers(&self) -> usize {
        self.state.lock().timers.len()
    }

    /// Number of async tasks waiting for [`run_until_idle`](Self::run_until_idle)
    pub fn queued_tasks(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Toggle whether the host accepts deferred and async work
    pub fn set_accepting(&self, accepting: bool) {
        self.state.lock().accepting = accepting;
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl HostScheduler for ManualScheduler {
    fn now(&self) -> Instant {
        let state = self.state.lock();
        state.origin + state.elapsed
    }

    fn schedule_after(&self, delay: Duration, task: Task) -> TimerHandle {
        let key = {
            let mut state = self.state.lock();
            let key = (state.elapsed + delay, state.next_seq);
            state.next_seq += 1;
            state.timers.insert(key, task);
            key
        };

        let weak: Weak<Mutex<ManualState>> = Arc::downgrade(&self.state);
        TimerHandle::new(move || {
            if let Some(state) = weak.upgrade() {
                state.lock().timers.remove(&key);
            }
        })
    }

    fn run_async(&self, task: Task) {
        self.state.lock().queue.push_back(task);
    }

    fn is_accepting(&self) -> bool {
        self.state.lock().accepting
    }
}
