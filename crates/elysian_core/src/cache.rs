//! Response cache.
//!
//! Serialized response bodies are kept per entity, keyed either by a
//! [`QueryFingerprint`] (list responses) or by document id (read
//! responses). Every entry lives for the configured TTL; any write to an
//! entity purges its whole sub-cache.

use crate::query::ListQuery;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// SHA-256 of the canonical rendering of a list request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryFingerprint([u8; 32]);

impl QueryFingerprint {
    /// Fingerprints a list request.
    ///
    /// The hashed stream is `entity|sort|fields|search|includes|username|
    /// count|direction|limit|offset` followed by `|field[op]=arg` for every
    /// filter, with fields and operators in sorted order.
    pub fn of(query: &ListQuery) -> Self {
        let (sort_field, ascending) = match &query.sort {
            Some(sort) => (sort.field.as_str(), sort.ascending),
            None => ("", true),
        };

        let fields = query.fields.join(",");
        let limit = query.limit.to_string();
        let mut hasher = Sha256::new();
        for part in [
            query.entity.as_str(),
            sort_field,
            fields.as_str(),
            query.search.as_str(),
            query.includes.as_str(),
            query.username.as_str(),
            if query.count_only { "1" } else { "0" },
            if ascending { "A" } else { "D" },
            limit.as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update(b"|");
        }
        hasher.update(query.offset.to_string().as_bytes());

        // LeafFilter is a BTreeMap at both levels, so iteration is sorted.
        for (field, ops) in &query.filters {
            for (op, arg) in ops {
                hasher.update(b"|");
                hasher.update(field.as_bytes());
                hasher.update(b"[");
                hasher.update(op.as_bytes());
                hasher.update(b"]=");
                hasher.update(arg.as_bytes());
            }
        }
        Self(hasher.finalize().into())
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for QueryFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct CacheItem {
    body: Arc<[u8]>,
    expires_at: Instant,
}

impl CacheItem {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Default)]
struct EntityCache {
    queries: HashMap<QueryFingerprint, CacheItem>,
    ids: HashMap<String, CacheItem>,
}

impl EntityCache {
    fn remove_expired(&mut self, now: Instant) -> usize {
        let before = self.queries.len() + self.ids.len();
        self.queries.retain(|_, item| item.is_live(now));
        self.ids.retain(|_, item| item.is_live(now));
        before - self.queries.len() - self.ids.len()
    }

    fn is_empty(&self) -> bool {
        self.queries.is_empty() && self.ids.is_empty()
    }
}

/// Purge generation of one entity, captured before computing a response.
///
/// A body computed under a generation is only stored while no purge of its
/// entity (or of the whole cache) has happened since.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheGeneration {
    epoch: u64,
    entity: u64,
}

#[derive(Debug, Default)]
struct Entities {
    caches: HashMap<String, Arc<Mutex<EntityCache>>>,
    generations: HashMap<String, u64>,
    epoch: u64,
}

impl Entities {
    fn generation(&self, entity: &str) -> CacheGeneration {
        CacheGeneration {
            epoch: self.epoch,
            entity: self.generations.get(entity).copied().unwrap_or(0),
        }
    }
}

/// Per-entity cache of serialized response bodies with TTL expiry.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entities: Mutex<Entities>,
}

impl ResponseCache {
    /// Creates an empty cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entities: Mutex::new(Entities::default()),
        }
    }

    /// Entry lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn entity(&self, entity: &str) -> Option<Arc<Mutex<EntityCache>>> {
        self.entities.lock().caches.get(entity).cloned()
    }

    /// The sub-cache of `entity`, or `None` if it was purged since
    /// `generation` was taken.
    fn entity_if_current(
        &self,
        entity: &str,
        generation: CacheGeneration,
    ) -> Option<Arc<Mutex<EntityCache>>> {
        let mut entities = self.entities.lock();
        if entities.generation(entity) != generation {
            return None;
        }
        Some(Arc::clone(
            entities.caches.entry(entity.to_string()).or_default(),
        ))
    }

    fn item(&self, body: Arc<[u8]>) -> CacheItem {
        CacheItem {
            body,
            expires_at: Instant::now() + self.ttl,
        }
    }

    /// Current purge generation of `entity`.
    pub fn generation(&self, entity: &str) -> CacheGeneration {
        self.entities.lock().generation(entity)
    }

    /// Returns a live list response.
    pub fn get(&self, entity: &str, fingerprint: &QueryFingerprint) -> Option<Arc<[u8]>> {
        let cache = self.entity(entity)?;
        let cache = cache.lock();
        cache
            .queries
            .get(fingerprint)
            .filter(|item| item.is_live(Instant::now()))
            .map(|item| Arc::clone(&item.body))
    }

    /// Stores a list response computed under `generation`. Returns false,
    /// storing nothing, if `entity` was purged in the meantime.
    pub fn set(
        &self,
        entity: &str,
        generation: CacheGeneration,
        fingerprint: QueryFingerprint,
        body: impl Into<Arc<[u8]>>,
    ) -> bool {
        let Some(cache) = self.entity_if_current(entity, generation) else {
            return false;
        };
        let item = self.item(body.into());
        cache.lock().queries.insert(fingerprint, item);
        true
    }

    /// Returns a live read response for document `id`.
    pub fn get_by_id(&self, entity: &str, id: &str) -> Option<Arc<[u8]>> {
        let cache = self.entity(entity)?;
        let cache = cache.lock();
        cache
            .ids
            .get(id)
            .filter(|item| item.is_live(Instant::now()))
            .map(|item| Arc::clone(&item.body))
    }

    /// Stores a read response for document `id`, unless `entity` was
    /// purged since `generation`.
    pub fn set_by_id(
        &self,
        entity: &str,
        generation: CacheGeneration,
        id: &str,
        body: impl Into<Arc<[u8]>>,
    ) -> bool {
        let Some(cache) = self.entity_if_current(entity, generation) else {
            return false;
        };
        let item = self.item(body.into());
        cache.lock().ids.insert(id.to_string(), item);
        true
    }

    /// Drops every entry of `entity`.
    pub fn purge(&self, entity: &str) {
        let mut entities = self.entities.lock();
        entities.caches.remove(entity);
        *entities.generations.entry(entity.to_string()).or_default() += 1;
    }

    /// Drops every entry.
    pub fn purge_all(&self) {
        let mut entities = self.entities.lock();
        entities.caches.clear();
        entities.generations.clear();
        entities.epoch += 1;
    }

    /// Removes expired entries and returns how many were dropped.
    pub fn clean_expired(&self) -> usize {
        let entities: Vec<(String, Arc<Mutex<EntityCache>>)> = self
            .entities
            .lock()
            .caches
            .iter()
            .map(|(name, cache)| (name.clone(), Arc::clone(cache)))
            .collect();

        let now = Instant::now();
        let mut removed = 0;
        let mut emptied = Vec::new();
        for (name, cache) in entities {
            let mut cache = cache.lock();
            removed += cache.remove_expired(now);
            if cache.is_empty() {
                emptied.push(name);
            }
        }

        if !emptied.is_empty() {
            let mut entities = self.entities.lock();
            for name in emptied {
                if entities.caches.get(&name).is_some_and(|c| c.lock().is_empty()) {
                    entities.caches.remove(&name);
                }
            }
        }
        removed
    }

    /// Number of stored entries, live or not.
    pub fn len(&self) -> usize {
        self.entities
            .lock()
            .caches
            .values()
            .map(|cache| {
                let cache = cache.lock();
                cache.queries.len() + cache.ids.len()
            })
            .sum()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn books() -> ListQuery {
        ListQuery::new("books")
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = books().filter("price", "gt", "3").filter("author", "eq", "X");
        let b = books().filter("author", "eq", "X").filter("price", "gt", "3");
        assert_eq!(QueryFingerprint::of(&a), QueryFingerprint::of(&b));
        assert_eq!(QueryFingerprint::of(&a).to_string().len(), 64);
    }

    #[test]
    fn fingerprint_distinguishes_parameters() {
        let base = QueryFingerprint::of(&books());
        let variants = [
            ListQuery::new("authors"),
            books().limit(1),
            books().offset(1),
            books().sort("price", true),
            books().sort("price", false),
            books().filter("price", "gt", "3"),
            books().search("x"),
            books().includes("author"),
            books().fields(["title"]),
            books().count_only(true),
            books().username("bob"),
        ];
        for variant in &variants {
            assert_ne!(QueryFingerprint::of(variant), base, "{variant:?}");
        }
        assert_ne!(
            QueryFingerprint::of(&books().sort("price", true)),
            QueryFingerprint::of(&books().sort("price", false))
        );
    }

    #[test]
    fn fingerprint_matches_canonical_stream() {
        let query = books()
            .limit(10)
            .offset(2)
            .sort("price", false)
            .filter("price", "gt", "3");
        let expected: [u8; 32] =
            Sha256::digest(b"books|price|||||0|D|10|2|price[gt]=3").into();
        assert_eq!(QueryFingerprint::of(&query).as_bytes(), &expected);
    }

    #[test]
    fn set_get_purge() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let fp = QueryFingerprint::of(&books());

        assert!(cache.get("books", &fp).is_none());
        assert!(cache.set("books", cache.generation("books"), fp, b"[]".to_vec()));
        cache.set_by_id("books", cache.generation("books"), "1", b"{}".to_vec());
        cache.set("authors", cache.generation("authors"), fp, b"[1]".to_vec());

        assert_eq!(cache.get("books", &fp).as_deref(), Some(&b"[]"[..]));
        assert_eq!(cache.get_by_id("books", "1").as_deref(), Some(&b"{}"[..]));
        assert_eq!(cache.len(), 3);

        cache.purge("books");
        assert!(cache.get("books", &fp).is_none());
        assert!(cache.get_by_id("books", "1").is_none());
        assert!(cache.get("authors", &fp).is_some());

        cache.purge_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn entries_expire() {
        let cache = ResponseCache::new(Duration::from_millis(20));
        let fp = QueryFingerprint::of(&books());
        let generation = cache.generation("books");
        cache.set("books", generation, fp, b"[]".to_vec());
        cache.set_by_id("books", generation, "1", b"{}".to_vec());
        assert!(cache.get("books", &fp).is_some());

        thread::sleep(Duration::from_millis(40));
        assert!(cache.get("books", &fp).is_none());
        assert!(cache.get_by_id("books", "1").is_none());
        assert_eq!(cache.clean_expired(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn purge_during_compute_discards_the_body() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let fp = QueryFingerprint::of(&books());

        let generation = cache.generation("books");
        cache.purge("books");
        assert!(!cache.set("books", generation, fp, b"stale".to_vec()));
        assert!(!cache.set_by_id("books", generation, "1", b"stale".to_vec()));
        assert!(cache.get("books", &fp).is_none());
        assert!(cache.get_by_id("books", "1").is_none());

        let generation = cache.generation("books");
        cache.purge_all();
        assert!(!cache.set("books", generation, fp, b"stale".to_vec()));
        assert!(cache.is_empty());

        let generation = cache.generation("books");
        cache.purge("authors");
        assert!(cache.set("books", generation, fp, b"fresh".to_vec()));
        assert_eq!(cache.get("books", &fp).as_deref(), Some(&b"fresh"[..]));
    }
}
