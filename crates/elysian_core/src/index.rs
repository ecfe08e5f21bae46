//! Per-entity ID lists and sort indexes.
//!
//! All index data lives in the byte store as newline-joined id or field
//! lists:
//!
//! - `api:entity:<E>:internal:index:id` holds every live id of `E`, once.
//! - `api:entity:<E>:internal:index:fields:all` lists the indexed fields.
//! - `api:entity:<E>:internal:index:field:<F>:sort:asc|desc` hold the ids
//!   ordered by `F` (see [`compare_sort_keys`]).
//!
//! Read-modify-write updates of the id and field lists are serialized per
//! entity. Sort rebuilds are serialized per entity too, so a rebuild never
//! overwrites a newer one with older results.

use crate::compare::{compare_sort_keys, SortKey};
use crate::error::CoreResult;
use crate::field::get_nested_value;
use crate::include::{apply_includes, IncludeTree, Includes};
use crate::keys::{
    document_key, entity_indexes_pattern, field_indexes_pattern, id_index_key,
    indexed_fields_key, is_valid_name, sort_index_key, validate_entity_name,
    validate_field_name,
};
use crate::query::SortSpec;
use elysian_store::KvStore;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Joins ids (or field names) into the stored list format.
pub fn encode_list(items: &[String]) -> Vec<u8> {
    items.join("\n").into_bytes()
}

/// Splits a stored list, skipping empty lines.
pub fn decode_list(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .split('\n')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// One mutex per entity name. Entries are never removed, so every caller
/// for a given entity serializes on the same mutex.
#[derive(Debug, Default)]
struct EntityLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl EntityLocks {
    fn get(&self, entity: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.lock().entry(entity.to_string()).or_default())
    }
}

/// Maintains ID lists and sort indexes over a [`KvStore`].
#[derive(Debug)]
pub struct IndexManager {
    store: Arc<KvStore>,
    meta_locks: EntityLocks,
    rebuild_locks: EntityLocks,
}

impl IndexManager {
    /// Creates a manager over `store`.
    pub fn new(store: Arc<KvStore>) -> Self {
        Self {
            store,
            meta_locks: EntityLocks::default(),
            rebuild_locks: EntityLocks::default(),
        }
    }

    fn read_list(&self, key: &str) -> Vec<String> {
        self.store
            .get(key)
            .map(|bytes| decode_list(&bytes))
            .unwrap_or_default()
    }

    fn write_list(&self, key: &str, items: &[String]) {
        self.store.put(key, encode_list(items));
    }

    // === ID list ===

    /// The ID list of `entity`, in insertion order.
    pub fn ids(&self, entity: &str) -> Vec<String> {
        self.read_list(&id_index_key(entity))
    }

    /// Number of ids in the ID list of `entity`.
    pub fn count(&self, entity: &str) -> usize {
        self.ids(entity).len()
    }

    /// Appends `id` unless already present. Returns true if it was added.
    pub fn add_id(&self, entity: &str, id: &str) -> bool {
        let lock = self.meta_locks.get(entity);
        let _guard = lock.lock();
        let key = id_index_key(entity);
        let mut ids = self.read_list(&key);
        if ids.iter().any(|existing| existing == id) {
            return false;
        }
        ids.push(id.to_string());
        self.write_list(&key, &ids);
        true
    }

    /// Removes `id`. Returns true if it was present.
    pub fn remove_id(&self, entity: &str, id: &str) -> bool {
        let lock = self.meta_locks.get(entity);
        let _guard = lock.lock();
        let key = id_index_key(entity);
        let mut ids = self.read_list(&key);
        let before = ids.len();
        ids.retain(|existing| existing != id);
        if ids.len() == before {
            return false;
        }
        self.write_list(&key, &ids);
        true
    }

    /// Drops duplicate ids and ids whose document no longer exists.
    /// Returns how many entries were removed.
    pub fn compact_ids(&self, entity: &str) -> usize {
        let lock = self.meta_locks.get(entity);
        let _guard = lock.lock();
        let key = id_index_key(entity);
        let ids = self.read_list(&key);
        let mut seen = HashSet::new();
        let kept: Vec<String> = ids
            .iter()
            .filter(|id| {
                seen.insert(id.as_str()) && self.store.json_exists(&document_key(entity, id))
            })
            .cloned()
            .collect();
        let removed = ids.len() - kept.len();
        if removed > 0 {
            self.write_list(&key, &kept);
        }
        removed
    }

    // === Sort indexes ===

    /// Fields with sort indexes for `entity`.
    pub fn indexed_fields(&self, entity: &str) -> Vec<String> {
        self.read_list(&indexed_fields_key(entity))
    }

    /// Returns true if both sort directions exist for `field`.
    pub fn index_exists(&self, entity: &str, field: &str) -> bool {
        self.store.exists(&sort_index_key(entity, field, true))
            && self.store.exists(&sort_index_key(entity, field, false))
    }

    /// Reads one direction of a sort index.
    pub fn sorted_ids(&self, entity: &str, field: &str, ascending: bool) -> Option<Vec<String>> {
        self.store
            .get(&sort_index_key(entity, field, ascending))
            .map(|bytes| decode_list(&bytes))
    }

    /// Orders the live documents of `entity` by `field`, both directions.
    ///
    /// Links along the parent path of a dotted field are expanded first, so
    /// `author.fullname` sorts by the linked author's name.
    fn sort_documents(&self, entity: &str, field: &str) -> (Vec<String>, Vec<String>) {
        let links = field.rsplit_once('.').map(|(parent, _)| {
            let mut tree = IncludeTree::default();
            tree.insert(parent);
            Includes::Paths(tree)
        });
        let resolve = |linked: &str, id: &str| {
            if is_valid_name(linked) {
                self.store.get_json(&document_key(linked, id))
            } else {
                None
            }
        };

        let mut seen = HashSet::new();
        let mut keyed: Vec<(String, SortKey)> = Vec::new();
        for id in self.ids(entity) {
            if !seen.insert(id.clone()) {
                continue;
            }
            let doc_key = document_key(entity, &id);
            let key = match &links {
                None => self.store.with_json(&doc_key, |doc| {
                    SortKey::from_value(get_nested_value(doc, field))
                }),
                Some(includes) => self.store.get_json(&doc_key).map(|mut doc| {
                    apply_includes(&mut doc, includes, &resolve);
                    SortKey::from_value(get_nested_value(&doc, field))
                }),
            };
            if let Some(key) = key {
                keyed.push((id, key));
            }
        }

        keyed.sort_by(|a, b| compare_sort_keys(&a.1, &b.1, true));
        let ascending: Vec<String> = keyed.iter().map(|(id, _)| id.clone()).collect();
        keyed.sort_by(|a, b| compare_sort_keys(&a.1, &b.1, false));
        let descending: Vec<String> = keyed.into_iter().map(|(id, _)| id).collect();
        (ascending, descending)
    }

    /// Builds (or rebuilds) both sort indexes for `field` and records the
    /// field in the indexed-fields list.
    pub fn create_indexes_for_field(&self, entity: &str, field: &str) -> CoreResult<()> {
        validate_entity_name(entity)?;
        validate_field_name(field)?;
        {
            let lock = self.rebuild_locks.get(entity);
            let _guard = lock.lock();
            let (ascending, descending) = self.sort_documents(entity, field);
            self.write_list(&sort_index_key(entity, field, true), &ascending);
            self.write_list(&sort_index_key(entity, field, false), &descending);
        }

        let lock = self.meta_locks.get(entity);
        let _guard = lock.lock();
        let key = indexed_fields_key(entity);
        let mut fields = self.read_list(&key);
        if !fields.iter().any(|f| f == field) {
            fields.push(field.to_string());
            self.write_list(&key, &fields);
        }
        Ok(())
    }

    /// Deletes both sort indexes of `field` and forgets the field.
    pub fn delete_indexes_for_field(&self, entity: &str, field: &str) -> CoreResult<usize> {
        validate_entity_name(entity)?;
        validate_field_name(field)?;
        let lock = self.meta_locks.get(entity);
        let _guard = lock.lock();
        let removed = self
            .store
            .delete_by_pattern(&field_indexes_pattern(entity, field))?;
        let key = indexed_fields_key(entity);
        let mut fields = self.read_list(&key);
        let before = fields.len();
        fields.retain(|f| f != field);
        if fields.len() != before {
            self.write_list(&key, &fields);
        }
        Ok(removed)
    }

    /// Deletes the ID list, the field list and every sort index of
    /// `entity`.
    pub fn remove_entity_indexes(&self, entity: &str) -> CoreResult<usize> {
        validate_entity_name(entity)?;
        let rebuild = self.rebuild_locks.get(entity);
        let _rebuild_guard = rebuild.lock();
        let meta = self.meta_locks.get(entity);
        let _meta_guard = meta.lock();
        Ok(self.store.delete_by_pattern(&entity_indexes_pattern(entity))?)
    }

    /// Compacts the ID list and rebuilds every indexed field. Returns how
    /// many fields were rebuilt.
    pub fn rebuild_entity(&self, entity: &str) -> CoreResult<usize> {
        self.compact_ids(entity);
        let fields = self.indexed_fields(entity);
        for field in &fields {
            self.create_indexes_for_field(entity, field)?;
        }
        debug!(entity, fields = fields.len(), "sort indexes rebuilt");
        Ok(fields.len())
    }

    /// The ordered ids to list for `entity`.
    ///
    /// Without a sort this is the ID list. With one, the sort index is used,
    /// building it first if it does not exist yet.
    pub fn get_list_of_ids(&self, entity: &str, sort: Option<&SortSpec>) -> CoreResult<Vec<String>> {
        let Some(sort) = sort.filter(|s| !s.field.is_empty()) else {
            return Ok(self.ids(entity));
        };
        if !self.index_exists(entity, &sort.field) {
            self.create_indexes_for_field(entity, &sort.field)?;
        }
        Ok(self
            .sorted_ids(entity, &sort.field, sort.ascending)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elysian_store::{Document, StoreConfig};
    use serde_json::{json, Value};
    use tempfile::tempdir;

    fn setup(dir: &std::path::Path) -> (Arc<KvStore>, IndexManager) {
        let store = Arc::new(KvStore::open(StoreConfig::new().folder(dir)).unwrap());
        let index = IndexManager::new(Arc::clone(&store));
        (store, index)
    }

    fn doc(value: Value) -> Document {
        let Value::Object(doc) = value else {
            panic!("not an object");
        };
        doc
    }

    fn put(store: &KvStore, index: &IndexManager, entity: &str, value: Value) {
        let doc = doc(value);
        let id = doc["id"].as_str().unwrap().to_string();
        store.put_json(document_key(entity, &id), doc);
        index.add_id(entity, &id);
    }

    #[test]
    fn list_encoding() {
        let ids = vec!["a".to_string(), "b".to_string()];
        assert_eq!(encode_list(&ids), b"a\nb");
        assert_eq!(decode_list(b"a\n\nb\n"), ids);
        assert!(decode_list(b"").is_empty());
    }

    #[test]
    fn id_list_dedupes() {
        let dir = tempdir().unwrap();
        let (_store, index) = setup(dir.path());

        assert!(index.add_id("books", "1"));
        assert!(index.add_id("books", "2"));
        assert!(!index.add_id("books", "1"));
        assert_eq!(index.ids("books"), vec!["1", "2"]);

        assert!(index.remove_id("books", "1"));
        assert!(!index.remove_id("books", "1"));
        assert_eq!(index.ids("books"), vec!["2"]);
        assert_eq!(index.count("books"), 1);
    }

    #[test]
    fn compaction_drops_missing_documents() {
        let dir = tempdir().unwrap();
        let (store, index) = setup(dir.path());
        put(&store, &index, "books", json!({"id": "1"}));
        store.put(id_index_key("books"), b"1\n1\n2".to_vec());

        assert_eq!(index.compact_ids("books"), 2);
        assert_eq!(index.ids("books"), vec!["1"]);
    }

    #[test]
    fn sort_indexes() {
        let dir = tempdir().unwrap();
        let (store, index) = setup(dir.path());
        put(&store, &index, "products", json!({"id": "a", "price": 2}));
        put(&store, &index, "products", json!({"id": "b", "price": 1}));
        put(&store, &index, "products", json!({"id": "c", "price": 3}));
        put(&store, &index, "products", json!({"id": "d"}));

        assert!(!index.index_exists("products", "price"));
        index.create_indexes_for_field("products", "price").unwrap();
        assert!(index.index_exists("products", "price"));
        assert_eq!(index.indexed_fields("products"), vec!["price"]);

        assert_eq!(
            index.sorted_ids("products", "price", true).unwrap(),
            vec!["b", "a", "c", "d"]
        );
        assert_eq!(
            index.sorted_ids("products", "price", false).unwrap(),
            vec!["c", "a", "b", "d"]
        );

        index.create_indexes_for_field("products", "price").unwrap();
        assert_eq!(index.indexed_fields("products"), vec!["price"]);
    }

    #[test]
    fn nested_field_index() {
        let dir = tempdir().unwrap();
        let (store, index) = setup(dir.path());
        put(&store, &index, "books", json!({"id": "1", "meta": {"year": 2001}}));
        put(&store, &index, "books", json!({"id": "2", "meta": {"year": 1999}}));

        let sort = SortSpec::new("meta.year", true);
        assert_eq!(
            index.get_list_of_ids("books", Some(&sort)).unwrap(),
            vec!["2", "1"]
        );
    }

    #[test]
    fn linked_field_index() {
        let dir = tempdir().unwrap();
        let (store, index) = setup(dir.path());
        store.put_json(
            document_key("authors", "u1"),
            doc(json!({"id": "u1", "fullname": "Zed"})),
        );
        store.put_json(
            document_key("authors", "u2"),
            doc(json!({"id": "u2", "fullname": "Amy"})),
        );
        put(&store, &index, "books", json!({"id": "b1", "author": {"@entity": "authors", "id": "u1"}}));
        put(&store, &index, "books", json!({"id": "b2", "author": {"@entity": "authors", "id": "u2"}}));
        put(&store, &index, "books", json!({"id": "b3", "author": {"@entity": "authors", "id": "gone"}}));

        let sort = SortSpec::new("author.fullname", true);
        assert_eq!(
            index.get_list_of_ids("books", Some(&sort)).unwrap(),
            vec!["b2", "b1", "b3"]
        );
        assert_eq!(
            index.sorted_ids("books", "author.fullname", false).unwrap(),
            vec!["b1", "b2", "b3"]
        );
    }

    #[test]
    fn list_builds_missing_index() {
        let dir = tempdir().unwrap();
        let (store, index) = setup(dir.path());
        put(&store, &index, "products", json!({"id": "a", "name": "pear"}));
        put(&store, &index, "products", json!({"id": "b", "name": "apple"}));

        assert_eq!(index.get_list_of_ids("products", None).unwrap(), vec!["a", "b"]);
        let sort = SortSpec::new("name", false);
        assert_eq!(
            index.get_list_of_ids("products", Some(&sort)).unwrap(),
            vec!["a", "b"]
        );
        assert!(index.index_exists("products", "name"));
    }

    #[test]
    fn rebuild_tracks_new_documents() {
        let dir = tempdir().unwrap();
        let (store, index) = setup(dir.path());
        put(&store, &index, "products", json!({"id": "a", "price": 5}));
        index.create_indexes_for_field("products", "price").unwrap();

        put(&store, &index, "products", json!({"id": "b", "price": 1}));
        assert_eq!(index.sorted_ids("products", "price", true).unwrap(), vec!["a"]);

        assert_eq!(index.rebuild_entity("products").unwrap(), 1);
        assert_eq!(
            index.sorted_ids("products", "price", true).unwrap(),
            vec!["b", "a"]
        );
    }

    #[test]
    fn deleting_indexes() {
        let dir = tempdir().unwrap();
        let (store, index) = setup(dir.path());
        put(&store, &index, "products", json!({"id": "a", "price": 5, "name": "x"}));
        index.create_indexes_for_field("products", "price").unwrap();
        index.create_indexes_for_field("products", "name").unwrap();

        assert_eq!(index.delete_indexes_for_field("products", "price").unwrap(), 2);
        assert!(!index.index_exists("products", "price"));
        assert_eq!(index.indexed_fields("products"), vec!["name"]);

        index.remove_entity_indexes("products").unwrap();
        assert!(index.ids("products").is_empty());
        assert!(index.indexed_fields("products").is_empty());
        assert!(!index.index_exists("products", "name"));
        assert!(store.json_exists(&document_key("products", "a")));
    }

    #[test]
    fn entity_locks_survive_index_removal() {
        let dir = tempdir().unwrap();
        let (_store, index) = setup(dir.path());
        index.add_id("products", "a");
        let meta = index.meta_locks.get("products");
        let rebuild = index.rebuild_locks.get("products");

        index.remove_entity_indexes("products").unwrap();
        assert!(Arc::ptr_eq(&meta, &index.meta_locks.get("products")));
        assert!(Arc::ptr_eq(&rebuild, &index.rebuild_locks.get("products")));
    }

    #[test]
    fn concurrent_removal_and_appends() {
        let dir = tempdir().unwrap();
        let (_store, index) = setup(dir.path());

        std::thread::scope(|s| {
            for writer in 0..4 {
                let index = &index;
                s.spawn(move || {
                    for n in 0..50 {
                        index.add_id("products", &format!("w{writer}-{n}"));
                    }
                });
            }
            s.spawn(|| {
                for _ in 0..20 {
                    index.remove_entity_indexes("products").unwrap();
                }
            });
        });

        // Appends after the last removal must all land.
        let survivors = index.ids("products");
        std::thread::scope(|s| {
            for writer in 0..4 {
                let index = &index;
                s.spawn(move || {
                    for n in 0..50 {
                        assert!(index.add_id("products", &format!("late{writer}-{n}")));
                    }
                });
            }
        });

        let ids = index.ids("products");
        assert_eq!(ids.len(), survivors.len() + 200);
        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn invalid_field_names_are_rejected() {
        let dir = tempdir().unwrap();
        let (_store, index) = setup(dir.path());
        assert!(index.create_indexes_for_field("books", "a:b").is_err());
        assert!(index.create_indexes_for_field("books", "*").is_err());
        let sort = SortSpec::new("bad field", true);
        assert!(index.get_list_of_ids("books", Some(&sort)).is_err());
    }
}
