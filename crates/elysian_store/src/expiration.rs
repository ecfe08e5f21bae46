//! Bucketed TTL index.

use crate::shard::DirtyTracker;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in seconds.
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

type Bucket = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<i64, Bucket>,
    index: HashMap<String, i64>,
}

/// Maps expiry seconds to keys, with a reverse `key -> expiry` index.
///
/// A key is either in both maps or in neither. Putting a key that already
/// has a TTL moves it to its new bucket.
#[derive(Debug, Default)]
pub struct ExpirationIndex {
    state: RwLock<State>,
    dirty: DirtyTracker,
}

impl ExpirationIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `keys` as expiring at `expires_at`.
    pub fn put<I, S>(&self, expires_at: i64, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.write();
        for key in keys {
            let key = key.into();
            match state.index.get(&key).copied() {
                Some(previous) if previous == expires_at => continue,
                Some(previous) => remove_from_bucket(&mut state.buckets, previous, &key),
                None => {}
            }
            state
                .buckets
                .entry(expires_at)
                .or_default()
                .lock()
                .push(key.clone());
            state.index.insert(key, expires_at);
        }
        drop(state);
        self.dirty.touch();
    }

    /// Removes `key` from both maps. Returns true if it had a TTL.
    pub fn del(&self, key: &str) -> bool {
        let mut state = self.state.write();
        let Some(expires_at) = state.index.remove(key) else {
            return false;
        };
        remove_from_bucket(&mut state.buckets, expires_at, key);
        drop(state);
        self.dirty.touch();
        true
    }

    /// Returns the expiry second of `key`.
    pub fn expires_at(&self, key: &str) -> Option<i64> {
        self.state.read().index.get(key).copied()
    }

    /// Returns true if `key` has a TTL.
    pub fn has_ttl(&self, key: &str) -> bool {
        self.state.read().index.contains_key(key)
    }

    /// Returns true if `key` has a TTL that is reached at `now`.
    pub fn has_expired(&self, key: &str, now: i64) -> bool {
        self.expires_at(key).is_some_and(|ts| now >= ts)
    }

    /// Bucket timestamps strictly before `now`.
    pub fn due_buckets(&self, now: i64) -> Vec<i64> {
        self.state.read().buckets.range(..now).map(|(ts, _)| *ts).collect()
    }

    /// Copies the keys currently in the bucket at `expires_at`.
    pub fn bucket_keys(&self, expires_at: i64) -> Vec<String> {
        let bucket = self.state.read().buckets.get(&expires_at).cloned();
        bucket.map(|b| b.lock().clone()).unwrap_or_default()
    }

    /// Drops the bucket at `expires_at` together with the reverse entries
    /// still pointing at it.
    pub fn drop_bucket(&self, expires_at: i64) {
        let mut state = self.state.write();
        let Some(bucket) = state.buckets.remove(&expires_at) else {
            return;
        };
        let keys = bucket.lock().clone();
        for key in keys {
            if state.index.get(&key) == Some(&expires_at) {
                state.index.remove(&key);
            }
        }
        drop(state);
        self.dirty.touch();
    }

    /// Number of keys with a TTL.
    pub fn len(&self) -> usize {
        self.state.read().index.len()
    }

    /// Returns true if no key has a TTL.
    pub fn is_empty(&self) -> bool {
        self.state.read().index.is_empty()
    }

    /// Snapshot form: `{"<unix-sec>": [keys…]}`.
    pub fn to_map(&self) -> BTreeMap<String, Vec<String>> {
        self.state
            .read()
            .buckets
            .iter()
            .map(|(ts, bucket)| (ts.to_string(), bucket.lock().clone()))
            .collect()
    }

    /// Replaces the contents from the snapshot form. Unparsable bucket
    /// names are skipped and returned.
    pub fn load_map(&self, map: BTreeMap<String, Vec<String>>) -> Vec<String> {
        *self.state.write() = State::default();
        let mut rejected = Vec::new();
        for (ts, keys) in map {
            match ts.parse::<i64>() {
                Ok(expires_at) => self.put(expires_at, keys),
                Err(_) => rejected.push(ts),
            }
        }
        self.dirty.mark_saved(self.dirty.capture());
        rejected
    }

    /// Removes every entry.
    pub fn reset(&self) {
        *self.state.write() = State::default();
        self.dirty.touch();
    }

    pub(crate) fn is_saved(&self) -> bool {
        self.dirty.is_saved()
    }

    pub(crate) fn snapshot_generation(&self) -> u64 {
        self.dirty.capture()
    }

    pub(crate) fn mark_saved(&self, generation: u64) {
        self.dirty.mark_saved(generation);
    }
}

fn remove_from_bucket(buckets: &mut BTreeMap<i64, Bucket>, expires_at: i64, key: &str) {
    let empty = match buckets.get(&expires_at) {
        Some(bucket) => {
            let mut keys = bucket.lock();
            keys.retain(|k| k != key);
            keys.is_empty()
        }
        None => false,
    };
    if empty {
        buckets.remove(&expires_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_lookup() {
        let index = ExpirationIndex::new();
        index.put(100, ["a", "b"]);
        assert_eq!(index.expires_at("a"), Some(100));
        assert!(index.has_ttl("b"));
        assert!(!index.has_ttl("c"));
        assert_eq!(index.bucket_keys(100), vec!["a", "b"]);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn reput_moves_key_between_buckets() {
        let index = ExpirationIndex::new();
        index.put(100, ["a"]);
        index.put(200, ["a"]);
        assert_eq!(index.expires_at("a"), Some(200));
        assert!(index.bucket_keys(100).is_empty());
        assert_eq!(index.due_buckets(150), Vec::<i64>::new());
    }

    #[test]
    fn del_keeps_maps_in_agreement() {
        let index = ExpirationIndex::new();
        index.put(100, ["a", "b"]);
        assert!(index.del("a"));
        assert!(!index.del("a"));
        assert_eq!(index.bucket_keys(100), vec!["b"]);
        assert!(index.del("b"));
        assert!(index.to_map().is_empty());
    }

    #[test]
    fn expiry_is_inclusive() {
        let index = ExpirationIndex::new();
        index.put(100, ["a"]);
        assert!(!index.has_expired("a", 99));
        assert!(index.has_expired("a", 100));
        assert!(!index.has_expired("missing", 1000));
    }

    #[test]
    fn due_buckets_are_strictly_past() {
        let index = ExpirationIndex::new();
        index.put(10, ["a"]);
        index.put(20, ["b"]);
        index.put(30, ["c"]);
        assert_eq!(index.due_buckets(20), vec![10]);
        assert_eq!(index.due_buckets(31), vec![10, 20, 30]);

        index.drop_bucket(10);
        assert!(!index.has_ttl("a"));
        assert!(index.has_ttl("b"));
    }

    #[test]
    fn snapshot_round_trip() {
        let index = ExpirationIndex::new();
        index.put(10, ["a", "b"]);
        index.put(20, ["c"]);

        let copy = ExpirationIndex::new();
        let rejected = copy.load_map(index.to_map());
        assert!(rejected.is_empty());
        assert_eq!(copy.to_map(), index.to_map());
        assert!(copy.is_saved());
    }

    #[test]
    fn load_skips_bad_bucket_names() {
        let mut map = BTreeMap::new();
        map.insert("soon".to_string(), vec!["a".to_string()]);
        map.insert("5".to_string(), vec!["b".to_string()]);
        let index = ExpirationIndex::new();
        assert_eq!(index.load_map(map), vec!["soon".to_string()]);
        assert_eq!(index.len(), 1);
    }
}
