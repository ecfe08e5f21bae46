//! Store configuration.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Largest accepted shard count.
pub const MAX_SHARDS: usize = 4096;

/// Configuration of the key/value engine (`store` section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    /// Directory holding snapshot and recovery files.
    pub folder: PathBuf,

    /// Number of shards per store. Must be a power of two.
    pub shards: usize,

    /// Period of the background snapshot loop (0 = no periodic flush).
    pub flush_interval_seconds: u64,

    /// Recovery log settings.
    pub crash_recovery: CrashRecoveryConfig,
}

/// Recovery log settings (`store.crashRecovery` section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrashRecoveryConfig {
    /// Whether every mutation is appended to a recovery log.
    pub enabled: bool,

    /// Log size in megabytes that triggers a snapshot and truncation.
    #[serde(rename = "maxLogMB")]
    pub max_log_mb: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("./data"),
            shards: 16,
            flush_interval_seconds: 5,
            crash_recovery: CrashRecoveryConfig::default(),
        }
    }
}

impl Default for CrashRecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_log_mb: 100,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the data folder.
    #[must_use]
    pub fn folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.folder = folder.into();
        self
    }

    /// Sets the shard count.
    #[must_use]
    pub const fn shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Sets the snapshot period in seconds.
    #[must_use]
    pub const fn flush_interval_seconds(mut self, seconds: u64) -> Self {
        self.flush_interval_seconds = seconds;
        self
    }

    /// Enables or disables the recovery logs.
    #[must_use]
    pub const fn crash_recovery(mut self, enabled: bool) -> Self {
        self.crash_recovery.enabled = enabled;
        self
    }

    /// Sets the recovery log rotation threshold in megabytes.
    #[must_use]
    pub const fn max_log_mb(mut self, megabytes: u64) -> Self {
        self.crash_recovery.max_log_mb = megabytes;
        self
    }

    /// Rotation threshold in bytes.
    #[must_use]
    pub const fn max_log_bytes(&self) -> u64 {
        self.crash_recovery.max_log_mb.saturating_mul(1024 * 1024)
    }

    /// Checks the shard count.
    pub fn validate(&self) -> StoreResult<()> {
        if self.shards == 0 || self.shards > MAX_SHARDS || !self.shards.is_power_of_two() {
            return Err(StoreError::InvalidShardCount {
                shards: self.shards,
                max: MAX_SHARDS,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.shards, 16);
        assert!(config.crash_recovery.enabled);
        assert_eq!(config.max_log_bytes(), 100 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = StoreConfig::new()
            .folder("/var/lib/elysian")
            .shards(64)
            .crash_recovery(false)
            .max_log_mb(1);

        assert_eq!(config.folder, PathBuf::from("/var/lib/elysian"));
        assert_eq!(config.shards, 64);
        assert!(!config.crash_recovery.enabled);
        assert_eq!(config.max_log_bytes(), 1024 * 1024);
    }

    #[test]
    fn rejects_bad_shard_counts() {
        for shards in [0, 3, 12, MAX_SHARDS * 2] {
            let err = StoreConfig::new().shards(shards).validate().unwrap_err();
            assert!(matches!(err, StoreError::InvalidShardCount { .. }));
        }
    }

    #[test]
    fn camel_case_keys() {
        let config: StoreConfig = serde_json::from_str(
            r#"{"folder":"x","shards":8,"flushIntervalSeconds":2,
                "crashRecovery":{"enabled":false,"maxLogMB":3}}"#,
        )
        .unwrap();
        assert_eq!(config.flush_interval_seconds, 2);
        assert_eq!(config.crash_recovery.max_log_mb, 3);
        assert!(!config.crash_recovery.enabled);
    }
}
