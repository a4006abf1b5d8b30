//! Persisted entries in an embedded sled database

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

const ENTRIES_TREE: &str = "entries";

/// Value as written by the cache, plus when it was persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub value: String,
    pub persisted_at_ms: u64,
}

impl StoredEntry {
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).context("Failed to serialize entry")
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).context("Failed to deserialize entry")
    }
}

/// Key-value store the cache persists into
pub struct SledStore {
    db: sled::Db,
    entries: sled::Tree,
}

impl SledStore {
    /// Open or create the store at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path)
            .with_context(|| format!("Failed to open store at {}", path.display()))?;
        let entries = db.open_tree(ENTRIES_TREE)?;
        Ok(Self { db, entries })
    }

    /// Insert or replace the entry for `key`
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        let entry = StoredEntry {
            value: value.to_string(),
            persisted_at_ms: current_timestamp_ms(),
        };
        self.entries.insert(key.as_bytes(), entry.serialize()?)?;
        Ok(())
    }

    /// Get the entry for `key`
    pub fn get(&self, key: &str) -> Result<Option<StoredEntry>> {
        match self.entries.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(StoredEntry::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All entries in key order
    pub fn entries(&self) -> Result<Vec<(String, StoredEntry)>> {
        let mut entries = Vec::new();
        for item in self.entries.iter() {
            let (key, value) = item?;
            let key = String::from_utf8(key.to_vec()).context("Stored key is not UTF-8")?;
            entries.push((key, StoredEntry::deserialize(&value)?));
        }
        Ok(entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flush to ensure durability
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
