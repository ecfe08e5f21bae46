//! # ElysianDB Store
//!
//! Sharded in-memory key/value engine for ElysianDB.
//!
//! This crate is the lowest layer of ElysianDB. It knows nothing about
//! entities or documents beyond "a key maps to bytes" and "a key maps to a
//! JSON object".
//!
//! ## Components
//!
//! - [`ShardedStore`] - concurrent map partitioned over a power-of-two number
//!   of shards, selected by xxh64
//! - [`ExpirationIndex`] - bucketed TTL index with reverse lookup
//! - [`SnapshotFiles`] - whole-store JSON snapshots in the data folder
//! - [`RecoveryLog`] - append-only JSON-lines log replayed at startup
//! - [`KvStore`] - facade tying the byte store, JSON store, expirations,
//!   snapshots and recovery logs together
//!
//! ## Example
//!
//! ```rust,no_run
//! use elysian_store::{KvStore, StoreConfig};
//!
//! let store = KvStore::open(StoreConfig::new().folder("/tmp/elysian")).unwrap();
//! store.put("greeting", b"hello".to_vec());
//! assert_eq!(store.get("greeting"), Some(b"hello".to_vec()));
//! store.write_to_db().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod encoding;
mod error;
mod expiration;
mod glob;
mod kv;
mod recovery;
mod shard;
mod snapshot;

pub use config::{CrashRecoveryConfig, StoreConfig, MAX_SHARDS};
pub use encoding::Base64Bytes;
pub use error::{StoreError, StoreResult};
pub use expiration::{unix_now, ExpirationIndex};
pub use glob::{glob_to_regex, GlobPattern};
pub use kv::KvStore;
pub use recovery::{
    LogCheckpoint, RecoveryLog, RecoveryOp, RecoveryRecord, JSON_RECOVERY_FILE,
    STORE_RECOVERY_FILE,
};
pub use shard::ShardedStore;
pub use snapshot::{SnapshotFiles, EXPIRATIONS_FILE, JSON_FILE, STORE_FILE};

/// A stored JSON document: a string-keyed map of JSON values.
pub type Document = serde_json::Map<String, serde_json::Value>;
