//! Configuration schema for bundle-cache
//!
//! Configuration is stored at `~/.config/bundle-cache/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Bundle cache settings
    pub cache: CacheConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Bundle cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Use the cache at all; when false every request builds directly
    pub enabled: bool,

    /// Shared cache root (defaults to the user cache directory)
    pub root: Option<PathBuf>,

    /// Seconds between cleanup cycles
    pub cleanup_secs: u64,

    /// Entries kept per session before the oldest are trimmed
    pub max_entries: usize,
}

impl CacheConfig {
    /// Default seconds between cleanup cycles
    pub const DEFAULT_CLEANUP_SECS: u64 = 1800;

    /// Default entries kept per session
    pub const DEFAULT_MAX_ENTRIES: usize = 1000;

    /// Cleanup period as a duration
    pub fn cleanup_period(&self) -> Duration {
        Duration::from_secs(self.cleanup_secs)
    }

    /// Configured root, or the per-user default
    pub fn resolved_root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(Self::default_root)
    }

    /// Default cache root under the platform cache directory
    pub fn default_root() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("bundle-cache")
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root: None,
            cleanup_secs: Self::DEFAULT_CLEANUP_SECS,
            max_entries: Self::DEFAULT_MAX_ENTRIES,
        }
    }
}

impl Config {
    /// Check values that deserialize fine but cannot be used
    pub fn validate(&self) -> Result<(), String> {
        if self.cache.cleanup_secs == 0 {
            return Err("cache.cleanup_secs must be greater than 0".to_string());
        }

        match self.general.log_format.as_str() {
            "text" | "json" => {}
            other => {
                return Err(format!(
                    "general.log_format must be \"text\" or \"json\", got \"{other}\""
                ))
            }
        }

        Ok(())
    }
}
