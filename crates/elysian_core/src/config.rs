//! Engine configuration.
//!
//! Loaded from TOML with camelCase keys. Every section has defaults, so an
//! empty file is a valid configuration:
//!
//! ```toml
//! [store]
//! folder = "/var/lib/elysiandb"
//! shards = 64
//! flushIntervalSeconds = 5
//!
//! [store.crashRecovery]
//! enabled = true
//! maxLogMB = 100
//!
//! [api.cache]
//! enabled = true
//! cleanupIntervalSeconds = 10
//!
//! [api.index]
//! workers = 4
//! ```

use crate::error::{CoreError, CoreResult};
use elysian_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Key/value store settings.
    pub store: StoreConfig,

    /// Entity API settings.
    pub api: ApiConfig,

    /// Logging settings.
    pub log: LogConfig,
}

/// Entity API settings (`api` section).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiConfig {
    /// Response cache.
    pub cache: CacheConfig,

    /// Sort index maintenance.
    pub index: IndexConfig,
}

/// Response cache settings (`api.cache` section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    /// Whether list and read responses are cached.
    pub enabled: bool,

    /// Entry lifetime in seconds.
    pub cleanup_interval_seconds: u64,
}

/// Index worker settings (`api.index` section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexConfig {
    /// Number of index rebuild workers.
    pub workers: usize,

    /// Bound of the dirty-entity queue.
    pub queue_capacity: usize,
}

/// Logging settings (`log` section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogConfig {
    /// Default filter directive, e.g. `info` or `elysian_core=debug`.
    pub level: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cleanup_interval_seconds: 10,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
        Self {
            workers: cores.min(8),
            queue_capacity: 1024,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads and validates a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses and validates a TOML configuration.
    pub fn from_toml_str(text: &str) -> CoreResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| CoreError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the data folder.
    #[must_use]
    pub fn folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.store.folder = folder.into();
        self
    }

    /// Sets the shard count.
    #[must_use]
    pub fn shards(mut self, shards: usize) -> Self {
        self.store.shards = shards;
        self
    }

    /// Sets the snapshot period (0 disables the flusher).
    #[must_use]
    pub fn flush_interval_seconds(mut self, seconds: u64) -> Self {
        self.store.flush_interval_seconds = seconds;
        self
    }

    /// Enables or disables the recovery logs.
    #[must_use]
    pub fn crash_recovery(mut self, enabled: bool) -> Self {
        self.store.crash_recovery.enabled = enabled;
        self
    }

    /// Sets the recovery log rotation threshold.
    #[must_use]
    pub fn max_log_mb(mut self, megabytes: u64) -> Self {
        self.store.crash_recovery.max_log_mb = megabytes;
        self
    }

    /// Enables or disables the response cache.
    #[must_use]
    pub fn cache(mut self, enabled: bool) -> Self {
        self.api.cache.enabled = enabled;
        self
    }

    /// Sets the response cache TTL and sweep period.
    #[must_use]
    pub fn cache_ttl_seconds(mut self, seconds: u64) -> Self {
        self.api.cache.cleanup_interval_seconds = seconds;
        self
    }

    /// Sets the number of index workers.
    #[must_use]
    pub fn index_workers(mut self, workers: usize) -> Self {
        self.api.index.workers = workers;
        self
    }

    /// Sets the dirty-entity queue bound.
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.api.index.queue_capacity = capacity;
        self
    }

    /// Sets the default log level.
    #[must_use]
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log.level = level.into();
        self
    }

    /// Checks every section.
    pub fn validate(&self) -> CoreResult<()> {
        self.store
            .validate()
            .map_err(|e| CoreError::config(e.to_string()))?;
        if self.store.folder.as_os_str().is_empty() {
            return Err(CoreError::config("store.folder must not be empty"));
        }
        if self.store.crash_recovery.enabled && self.store.crash_recovery.max_log_mb == 0 {
            return Err(CoreError::config(
                "store.crashRecovery.maxLogMB must be at least 1 when recovery is enabled",
            ));
        }
        if self.api.cache.enabled && self.api.cache.cleanup_interval_seconds == 0 {
            return Err(CoreError::config(
                "api.cache.cleanupIntervalSeconds must be at least 1 when the cache is enabled",
            ));
        }
        if self.api.index.workers == 0 {
            return Err(CoreError::config("api.index.workers must be at least 1"));
        }
        if self.api.index.queue_capacity == 0 {
            return Err(CoreError::config("api.index.queueCapacity must be at least 1"));
        }
        Ok(())
    }
}
