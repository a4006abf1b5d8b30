//! Persistence callback seam

/// Receives a key and its current value whenever the cache dispatches a persist.
///
/// Called from whatever thread the scheduler runs work on, or inline on the
/// caller's thread for forced flushes and during shutdown. Errors are logged
/// by the cache and otherwise dropped: the persist timestamp is already
/// committed when this runs.
pub trait Persist<K, V>: Send + Sync + 'static {
    /// Hand `value` for `key` to the backend
    fn persist(&self, key: &K, value: V) -> anyhow::Result<()>;
}

impl<K, V, F> Persist<K, V> for F
where
    F: Fn(&K, V) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn persist(&self, key: &K, value: V) -> anyhow::Result<()> {
        self(key, value)
    }
}
