//! Engine statistics.
//!
//! Counters are updated with relaxed atomics on the hot paths and read as a
//! consistent-enough [`StatsSnapshot`] through [`Engine::stats`].
//!
//! [`Engine::stats`]: crate::Engine::stats

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live engine counters.
///
/// All counters are monotonically increasing.
#[derive(Debug, Default)]
pub struct EngineStats {
    // Operation counters
    /// Documents read by id.
    reads: AtomicU64,
    /// Documents written (including extracted sub-entities).
    writes: AtomicU64,
    /// Documents deleted.
    deletes: AtomicU64,
    /// List and query executions.
    queries: AtomicU64,

    // Cache counters
    /// Response cache hits.
    cache_hits: AtomicU64,
    /// Response cache misses.
    cache_misses: AtomicU64,

    // Maintenance counters
    /// Successful snapshots.
    snapshots: AtomicU64,
    /// Entity index rebuilds.
    index_rebuilds: AtomicU64,

    // Transaction counters
    /// Transactions begun.
    transactions_started: AtomicU64,
    /// Transactions committed successfully.
    transactions_committed: AtomicU64,
    /// Transactions rolled back.
    transactions_rolled_back: AtomicU64,

    // Error counters
    /// Failed background or explicit operations.
    errors: AtomicU64,
}

impl EngineStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    // === Increment methods (internal use) ===

    pub(crate) fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_writes(&self, count: u64) {
        self.writes.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_deletes(&self, count: u64) {
        self.deletes.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_snapshot(&self) {
        self.snapshots.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_index_rebuild(&self) {
        self.index_rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_start(&self) {
        self.transactions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_commit(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_rollback(&self) {
        self.transactions_rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    // === Getters ===

    /// Documents read by id.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Documents written.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Documents deleted.
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Response cache hits.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Response cache misses.
    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    /// Copies every counter. `documents` is the current document count.
    pub fn snapshot(&self, documents: u64) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            snapshots: self.snapshots.load(Ordering::Relaxed),
            index_rebuilds: self.index_rebuilds.load(Ordering::Relaxed),
            transactions_started: self.transactions_started.load(Ordering::Relaxed),
            transactions_committed: self.transactions_committed.load(Ordering::Relaxed),
            transactions_rolled_back: self.transactions_rolled_back.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            documents,
        }
    }
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Documents read by id.
    pub reads: u64,
    /// Documents written.
    pub writes: u64,
    /// Documents deleted.
    pub deletes: u64,
    /// List and query executions.
    pub queries: u64,
    /// Response cache hits.
    pub cache_hits: u64,
    /// Response cache misses.
    pub cache_misses: u64,
    /// Successful snapshots.
    pub snapshots: u64,
    /// Entity index rebuilds.
    pub index_rebuilds: u64,
    /// Transactions begun.
    pub transactions_started: u64,
    /// Transactions committed.
    pub transactions_committed: u64,
    /// Transactions rolled back.
    pub transactions_rolled_back: u64,
    /// Failed operations.
    pub errors: u64,
    /// Documents currently stored.
    pub documents: u64,
}

impl StatsSnapshot {
    /// Fraction of cache lookups that hit, or 0 without lookups.
    pub fn cache_hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}
