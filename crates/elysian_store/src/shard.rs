//! Sharded concurrent maps.
//!
//! A [`ShardedStore`] partitions its keys over `N` independent maps, each
//! behind its own reader/writer lock. The shard of a key is
//! `xxh64(key) & (N - 1)`; `N` is a power of two fixed at construction, so
//! a key always lives in exactly one shard and rehashing never happens.

use crate::config::MAX_SHARDS;
use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use xxhash_rust::xxh64::xxh64;

/// Tracks whether the on-disk snapshot reflects the in-memory state.
///
/// Every mutation bumps a generation counter. A snapshot captures the
/// generation before reading the data and records it once the write has
/// succeeded; the store is saved while both counters agree.
#[derive(Debug, Default)]
pub(crate) struct DirtyTracker {
    generation: AtomicU64,
    saved_generation: AtomicU64,
}

impl DirtyTracker {
    pub(crate) fn touch(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn capture(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub(crate) fn mark_saved(&self, generation: u64) {
        self.saved_generation.fetch_max(generation, Ordering::AcqRel);
    }

    pub(crate) fn is_saved(&self) -> bool {
        self.saved_generation.load(Ordering::Acquire) == self.generation.load(Ordering::Acquire)
    }
}

/// A concurrent `String -> V` map split over a power-of-two number of shards.
#[derive(Debug)]
pub struct ShardedStore<V> {
    shards: Vec<RwLock<HashMap<String, V>>>,
    mask: u64,
    dirty: DirtyTracker,
}

impl<V: Clone> ShardedStore<V> {
    /// Creates an empty store with `shard_count` shards.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidShardCount`] unless `shard_count` is a
    /// power of two no larger than [`MAX_SHARDS`].
    pub fn new(shard_count: usize) -> StoreResult<Self> {
        if shard_count == 0 || shard_count > MAX_SHARDS || !shard_count.is_power_of_two() {
            return Err(StoreError::InvalidShardCount {
                shards: shard_count,
                max: MAX_SHARDS,
            });
        }
        Ok(Self {
            shards: (0..shard_count).map(|_| RwLock::new(HashMap::new())).collect(),
            mask: shard_count as u64 - 1,
            dirty: DirtyTracker::default(),
        })
    }

    /// Returns the number of shards.
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Returns the shard holding `key`.
    #[must_use]
    pub fn shard_index(&self, key: &str) -> usize {
        (xxh64(key.as_bytes(), 0) & self.mask) as usize
    }

    fn shard(&self, key: &str) -> &RwLock<HashMap<String, V>> {
        &self.shards[self.shard_index(key)]
    }

    /// Returns a copy of the value under `key`.
    pub fn get(&self, key: &str) -> Option<V> {
        self.shard(key).read().get(key).cloned()
    }

    /// Runs `f` against the value under `key` without cloning it.
    pub fn with_value<R>(&self, key: &str, f: impl FnOnce(&V) -> R) -> Option<R> {
        self.shard(key).read().get(key).map(f)
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.shard(key).read().contains_key(key)
    }

    /// Inserts `value` under `key`, returning the previous value.
    pub fn put(&self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        let previous = self.shard(&key).write().insert(key, value);
        self.dirty.touch();
        previous
    }

    /// Removes `key`, returning its value if it was present.
    pub fn delete(&self, key: &str) -> Option<V> {
        let removed = self.shard(key).write().remove(key);
        if removed.is_some() {
            self.dirty.touch();
        }
        removed
    }

    /// Visits every entry, one shard at a time.
    ///
    /// There is no global snapshot: mutations on other threads during the
    /// walk may or may not be observed.
    pub fn iterate(&self, mut f: impl FnMut(&str, &V)) {
        for shard in &self.shards {
            let guard = shard.read();
            for (key, value) in guard.iter() {
                f(key, value);
            }
        }
    }

    /// Collects the keys accepted by `predicate`.
    pub fn keys_matching(&self, predicate: impl Fn(&str) -> bool) -> Vec<String> {
        let mut keys = Vec::new();
        for shard in &self.shards {
            keys.extend(shard.read().keys().filter(|k| predicate(k)).cloned());
        }
        keys
    }

    /// Copies the whole store into an ordered map.
    pub fn to_map(&self) -> BTreeMap<String, V> {
        let mut out = BTreeMap::new();
        self.iterate(|k, v| {
            out.insert(k.to_string(), v.clone());
        });
        out
    }

    /// Replaces the contents with `entries` and marks the store saved.
    pub fn load_map(&self, entries: impl IntoIterator<Item = (String, V)>) {
        for shard in &self.shards {
            shard.write().clear();
        }
        for (key, value) in entries {
            let index = self.shard_index(&key);
            self.shards[index].write().insert(key, value);
        }
        self.dirty.touch();
        self.dirty.mark_saved(self.dirty.capture());
    }

    /// Empties every shard.
    pub fn clear(&self) {
        for shard in &self.shards {
            shard.write().clear();
        }
        self.dirty.touch();
    }

    /// Returns the number of keys across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    /// Returns true if no shard holds a key.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.read().is_empty())
    }

    /// Returns true if the last successful snapshot covers every mutation.
    pub fn is_saved(&self) -> bool {
        self.dirty.is_saved()
    }

    /// Captures the current generation ahead of a snapshot.
    pub fn snapshot_generation(&self) -> u64 {
        self.dirty.capture()
    }

    /// Records that a snapshot taken at `generation` reached disk.
    pub fn mark_saved(&self, generation: u64) {
        self.dirty.mark_saved(generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn put_get_delete() {
        let store = ShardedStore::new(8).unwrap();
        assert_eq!(store.put("a", 1), None);
        assert_eq!(store.put("a", 2), Some(1));
        assert_eq!(store.get("a"), Some(2));
        assert!(store.contains_key("a"));
        assert_eq!(store.delete("a"), Some(2));
        assert_eq!(store.delete("a"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn rejects_non_power_of_two() {
        assert!(ShardedStore::<u8>::new(6).is_err());
        assert!(ShardedStore::<u8>::new(0).is_err());
        assert!(ShardedStore::<u8>::new(1).is_ok());
    }

    #[test]
    fn saved_flag_follows_mutations() {
        let store = ShardedStore::new(4).unwrap();
        assert!(store.is_saved());

        store.put("k", 1);
        assert!(!store.is_saved());

        let generation = store.snapshot_generation();
        let _ = store.to_map();
        store.put("k2", 2);
        store.mark_saved(generation);
        assert!(!store.is_saved(), "a write after capture keeps the store dirty");

        store.mark_saved(store.snapshot_generation());
        assert!(store.is_saved());
    }

    #[test]
    fn deleting_missing_key_stays_saved() {
        let store: ShardedStore<u8> = ShardedStore::new(4).unwrap();
        store.delete("missing");
        assert!(store.is_saved());
    }

    #[test]
    fn map_round_trip() {
        let store = ShardedStore::new(16).unwrap();
        for i in 0..100 {
            store.put(format!("key:{i}"), i);
        }
        let copy = ShardedStore::new(16).unwrap();
        copy.load_map(store.to_map());
        assert_eq!(copy.to_map(), store.to_map());
        assert!(copy.is_saved());
    }

    #[test]
    fn concurrent_writers() {
        let store = Arc::new(ShardedStore::new(8).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..250 {
                        store.put(format!("{t}:{i}"), i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 1000);
    }

    proptest! {
        #[test]
        fn shard_index_is_stable_and_in_range(key in ".{0,40}", shift in 0u32..8) {
            let store: ShardedStore<u8> = ShardedStore::new(1 << shift).unwrap();
            let index = store.shard_index(&key);
            prop_assert!(index < store.shard_count());
            prop_assert_eq!(index, store.shard_index(&key));
        }
    }
}
