//! # ElysianDB Core
//!
//! Entity layer of ElysianDB, built on the key/value engine in
//! [`elysian_store`].
//!
//! This crate provides:
//! - Entity documents with automatic ids and sub-entity extraction
//! - Per-entity ID lists and lazily built sort indexes
//! - Listing with filters, search, pagination, includes and projections
//! - Structured queries over `and`/`or` filter trees
//! - A response cache keyed by SHA-256 query fingerprints
//! - An in-memory transaction buffer
//! - Background index workers, snapshot flusher and expiration sweeper
//!
//! Everything a transport layer needs is on the [`Engine`] trait, which
//! [`NativeEngine`] implements.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod dirty;
mod engine;
mod error;
mod schema;
mod stats;
mod transaction;

pub mod compare;
pub mod field;
pub mod filter;
pub mod include;
pub mod index;
pub mod keys;
pub mod query;
pub mod relationship;

pub use cache::{CacheGeneration, QueryFingerprint, ResponseCache};
pub use config::{ApiConfig, CacheConfig, Config, IndexConfig, LogConfig};
pub use dirty::{DirtyQueue, PushOutcome};
pub use engine::{Engine, EngineOptions, ListResponse, NativeEngine};
pub use error::{CoreError, CoreResult};
pub use filter::{FilterNode, LeafFilter, Operator};
pub use query::{ListQuery, Query, SortSpec};
pub use schema::{AcceptAll, SchemaValidator, ValidationError};
pub use stats::{EngineStats, StatsSnapshot};
pub use transaction::{
    OperationKind, Transaction, TransactionManager, TransactionOperation,
};

pub use elysian_store::{Document, StoreConfig};

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
