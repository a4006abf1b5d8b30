//! Host settings (TOML)
//!
//! ```toml
//! [cache]
//! cooldown_ms = 60000
//!
//! [store]
//! path = "cooldown.db"
//! ```

use anyhow::{Context, Result};
use cache::CacheConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cache: CacheConfig,
    pub store: StoreSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// sled database directory
    pub path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("cooldown.db"),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid settings file {}", path.display()))
    }

    /// Parse and validate settings
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let settings: Self = toml::from_str(s)?;
        settings.cache.validate()?;
        Ok(settings)
    }
}
