//! Cooldown demo host
//!
//! Feeds `key=value` lines through a `DebounceCache` into a sled-backed store:
//! - Settings loading (TOML)
//! - Line parsing
//! - Ingest loop with shutdown drain
//! - Persisted entry store

pub mod ingest;
pub mod input;
pub mod settings;
pub mod store;

pub use ingest::{ingest, IngestReport};
pub use settings::Settings;
pub use store::{SledStore, StoredEntry};
