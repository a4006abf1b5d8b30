//! Debounced write-back cache
//!
//! Every key moves between two states:
//! - idle: nothing scheduled
//! - pending: one deferred flush scheduled, firing when the cooldown since the
//!   last persist runs out
//!
//! A write outside the cooldown persists right away. A write inside it either
//! schedules the deferred flush or, if one is already pending, just updates the
//! value that flush will pick up when it fires.

use crate::config::CacheConfig;
use crate::persist::Persist;
use crate::scheduler::{HostScheduler, TimerHandle};
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use parking_lot::ReentrantMutex;
use std::cell::Cell;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Per-key state: cached value, persist bookkeeping, pending flush
struct Slot<V> {
    value: V,
    /// When the value was last handed to the persist callback
    last_persisted: Option<Instant>,
    pending: Option<PendingFlush>,
    /// Sequence number of the latest dispatch
    dispatched: u64,
    delivered: DeliveryGate,
}

/// Highest dispatch sequence that reached the callback
///
/// Held across the callback so deliveries for one key never interleave.
/// Reentrant: an inline delivery may happen from inside the callback.
type DeliveryGate = Arc<ReentrantMutex<Cell<u64>>>;

impl<V: Clone> Slot<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            last_persisted: None,
            pending: None,
            dispatched: 0,
            delivered: Arc::new(ReentrantMutex::new(Cell::new(0))),
        }
    }

    /// Mark the slot persisted as of `now`, returning the dispatch sequence and value
    fn begin_dispatch(&mut self, now: Instant) -> (u64, V) {
        self.last_persisted = Some(now);
        self.dispatched += 1;
        (self.dispatched, self.value.clone())
    }
}

/// Deferred flush registered for a key
///
/// The id ties the registry entry to the timer that will fire it. A timer
/// whose id no longer matches the entry was superseded and must not dispatch.
struct PendingFlush {
    id: u64,
    timer: TimerHandle,
}

struct Inner<K, V, S> {
    cooldown: Duration,
    slots: DashMap<K, Slot<V>, ahash::RandomState>,
    persist: Box<dyn Persist<K, V>>,
    scheduler: S,
    next_flush_id: AtomicU64,
}

/// Key-addressed write-back cache persisting each key at most once per cooldown
///
/// Cloning is cheap and yields another handle to the same cache.
///
/// No lock is held while the persist callback runs, so the callback may read
/// from the cache. Per key, a dispatch that reaches the callback after a newer
/// one already did is skipped, so the backend never goes back to an older value.
pub struct DebounceCache<K, V, S> {
    inner: Arc<Inner<K, V, S>>,
}

impl<K, V, S> Clone for DebounceCache<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Outcome of the write decision, acted on after the slot lock is released
enum WriteAction<V> {
    Dispatch(u64, V),
    Scheduled(Duration),
    Coalesced,
}

impl<K, V, S> DebounceCache<K, V, S>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: HostScheduler,
{
    /// Create a cache that persists through `persist` at most once per `cooldown` per key
    pub fn new(cooldown: Duration, persist: impl Persist<K, V>, scheduler: S) -> Self {
        Self {
            inner: Arc::new(Inner {
                cooldown,
                slots: DashMap::with_hasher(ahash::RandomState::new()),
                persist: Box::new(persist),
                scheduler,
                next_flush_id: AtomicU64::new(0),
            }),
        }
    }

    /// Create a cache from a validated config
    pub fn from_config(config: &CacheConfig, persist: impl Persist<K, V>, scheduler: S) -> Self {
        Self::new(config.cooldown(), persist, scheduler)
    }

    /// Minimum time between two persists of the same key
    pub fn cooldown(&self) -> Duration {
        self.inner.cooldown
    }

    /// The scheduler this cache defers work to
    pub fn scheduler(&self) -> &S {
        &self.inner.scheduler
    }

    /// Whether a value has ever been cached for `key`
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.slots.contains_key(key)
    }

    /// Latest cached value for `key`
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.slots.get(key).map(|slot| slot.value.clone())
    }

    /// Number of cached keys
    pub fn len(&self) -> usize {
        self.inner.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.slots.is_empty()
    }

    /// Whether a deferred flush is scheduled for `key`
    pub fn is_pending(&self, key: &K) -> bool {
        self.inner
            .slots
            .get(key)
            .map_or(false, |slot| slot.pending.is_some())
    }

    /// Number of keys with a deferred flush scheduled
    pub fn pending_count(&self) -> usize {
        self.inner
            .slots
            .iter()
            .filter(|slot| slot.pending.is_some())
            .count()
    }

    /// Update the cached value without touching persistence
    pub fn put_cached(&self, key: K, value: V) {
        self.inner.store(key, value);
    }

    /// Cache `value` and persist it, immediately or once the cooldown allows
    ///
    /// The value is visible to [`get`](Self::get) before this returns. Never
    /// blocks on the persist callback while the scheduler accepts work.
    pub fn write(&self, key: K, value: V) {
        let inner = &self.inner;
        let now = inner.scheduler.now();
        let accepting = inner.scheduler.is_accepting();

        let action = {
            let mut slot = inner.store(key.clone(), value);

            let remaining = slot
                .last_persisted
                .map(|at| now.saturating_duration_since(at))
                .and_then(|elapsed| inner.cooldown.checked_sub(elapsed))
                .filter(|remaining| !remaining.is_zero());

            match remaining {
                // A timer that never fires would drop the write
                Some(_) if !accepting => take_for_dispatch(&mut *slot, now),
                Some(_) if slot.pending.is_some() => WriteAction::Coalesced,
                Some(delay) => {
                    let id = inner.next_flush_id.fetch_add(1, Ordering::Relaxed);
                    let weak = Arc::downgrade(inner);
                    let fire_key = key.clone();
                    let timer = inner.scheduler.schedule_after(
                        delay,
                        Box::new(move || Inner::fire(&weak, fire_key, id)),
                    );
                    slot.pending = Some(PendingFlush { id, timer });
                    WriteAction::Scheduled(delay)
                }
                // Out of the cooldown window. A pending flush still registered
                // here belongs to a late timer; this dispatch replaces it.
                None => take_for_dispatch(&mut *slot, now),
            }
        };

        match action {
            WriteAction::Dispatch(seq, value) => {
                debug!(?key, seq, "Persisting immediately");
                inner.dispatch(key, seq, value);
            }
            WriteAction::Scheduled(delay) => {
                debug!(?key, ?delay, "Scheduled deferred persist");
            }
            WriteAction::Coalesced => {
                trace!(?key, "Write coalesced into pending persist");
            }
        }
    }

    /// Run the pending flush for `key` now, on the calling thread
    ///
    /// Returns false (and does nothing) if no flush is pending for `key`.
    pub fn flush(&self, key: &K) -> bool {
        let inner = &self.inner;
        let now = inner.scheduler.now();

        let (seq, value) = {
            let Some(mut slot) = inner.slots.get_mut(key) else {
                return false;
            };
            let Some(pending) = slot.pending.take() else {
                return false;
            };
            pending.timer.cancel();
            slot.begin_dispatch(now)
        };

        debug!(?key, seq, "Flushing pending persist");
        inner.deliver(key, seq, value);
        true
    }

    /// Run every pending flush now, on the calling thread
    ///
    /// Works from a snapshot of the pending keys; a key whose timer fires
    /// concurrently is skipped rather than persisted twice. Returns the number
    /// of flushes run.
    pub fn flush_all(&self) -> usize {
        let keys: Vec<K> = self
            .inner
            .slots
            .iter()
            .filter(|slot| slot.pending.is_some())
            .map(|slot| slot.key().clone())
            .collect();

        let flushed = keys.iter().filter(|key| self.flush(key)).count();
        if flushed > 0 {
            debug!("Flushed {} pending persists", flushed);
        }
        flushed
    }
}

/// Drop any pending flush and start a dispatch
fn take_for_dispatch<V: Clone>(slot: &mut Slot<V>, now: Instant) -> WriteAction<V> {
    if let Some(stale) = slot.pending.take() {
        stale.timer.cancel();
    }
    let (seq, value) = slot.begin_dispatch(now);
    WriteAction::Dispatch(seq, value)
}

impl<K, V, S> Inner<K, V, S>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: HostScheduler,
{
    /// Overwrite the cached value, creating the slot on first use
    fn store(&self, key: K, value: V) -> RefMut<'_, K, Slot<V>, ahash::RandomState> {
        match self.slots.entry(key) {
            Entry::Occupied(entry) => {
                let mut slot = entry.into_ref();
                slot.value = value;
                slot
            }
            Entry::Vacant(entry) => entry.insert(Slot::new(value)),
        }
    }

    /// Timer callback for a deferred flush
    fn fire(weak: &Weak<Self>, key: K, id: u64) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let now = inner.scheduler.now();

        let (seq, value) = {
            let Some(mut slot) = inner.slots.get_mut(&key) else {
                return;
            };
            match slot.pending {
                Some(ref pending) if pending.id == id => {}
                _ => {
                    trace!(?key, id, "Deferred persist already handled");
                    return;
                }
            }
            slot.pending = None;
            slot.begin_dispatch(now)
        };

        debug!(?key, seq, "Running deferred persist");
        inner.dispatch(key, seq, value);
    }

    /// Hand the value to the persist callback, off-thread while the host accepts work
    fn dispatch(self: &Arc<Self>, key: K, seq: u64, value: V) {
        if self.scheduler.is_accepting() {
            let inner = Arc::clone(self);
            self.scheduler
                .run_async(Box::new(move || inner.deliver(&key, seq, value)));
        } else {
            self.deliver(&key, seq, value);
        }
    }

    /// Invoke the persist callback unless a newer dispatch already reached it
    fn deliver(&self, key: &K, seq: u64, value: V) {
        let gate = match self.slots.get(key) {
            Some(slot) => Arc::clone(&slot.delivered),
            None => return,
        };

        // Shard lock is released here; only the per-key gate is held
        let delivered = gate.lock();
        if delivered.get() >= seq {
            trace!(?key, seq, "Skipping superseded persist");
            return;
        }
        delivered.set(seq);

        if let Err(e) = self.persist.persist(key, value) {
            warn!(?key, "Persist failed: {:#}", e);
        }
    }
}
