//! Debounced write-back cache
//!
//! This crate provides:
//! - `DebounceCache`: latest value per key in memory, persisted at most once
//!   per cooldown window per key
//! - Coalescing of rapid writes into a single deferred persist
//! - Forced flushing of pending persists (one key or all of them)
//! - `HostScheduler` seam with a Tokio-backed and a manual (virtual clock) scheduler

pub mod config;
pub mod debounce;
pub mod persist;
pub mod scheduler;

// Re-exports
pub use config::{CacheConfig, ConfigError};
pub use debounce::DebounceCache;
pub use persist::Persist;
pub use scheduler::{HostScheduler, ManualScheduler, Task, TimerHandle, TokioScheduler};
