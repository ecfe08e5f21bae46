//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A snapshot or log record could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A key pattern could not be compiled.
    #[error("invalid key pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// A snapshot file has an unexpected shape.
    #[error("store corrupted: {0}")]
    Corrupted(String),

    /// The configured shard count is unusable.
    #[error("invalid shard count {shards}: must be a power of two between 1 and {max}")]
    InvalidShardCount {
        /// The rejected shard count.
        shards: usize,
        /// The largest accepted shard count.
        max: usize,
    },
}

impl StoreError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }
}
