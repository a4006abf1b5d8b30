//! Cache configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Upper bound accepted for `cooldown_ms` (24h)
pub const MAX_COOLDOWN_MS: u64 = 24 * 60 * 60 * 1000;

/// Errors raised while loading or validating a [`CacheConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cooldown_ms must be between 0 and {max}, got {got}")]
    CooldownOutOfRange { got: u64, max: u64 },
}

/// Debounce configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Minimum time between two persists of the same key (default: 60s)
    pub cooldown_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 60 * 1000,
        }
    }
}

impl CacheConfig {
    /// Config with the given cooldown
    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            cooldown_ms: cooldown.as_millis().min(u64::MAX as u128) as u64,
        }
    }

    /// Parse and validate a TOML document
    ///
    /// Missing keys fall back to their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cooldown_ms > MAX_COOLDOWN_MS {
            return Err(ConfigError::CooldownOutOfRange {
                got: self.cooldown_ms,
                max: MAX_COOLDOWN_MS,
            });
        }
        Ok(())
    }

    /// Cooldown as a `Duration`
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}
