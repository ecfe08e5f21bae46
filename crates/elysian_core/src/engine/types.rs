//! Entity type registry, counts and bulk dump/import.

use super::native::EngineState;
use crate::error::{CoreError, CoreResult};
use crate::index::{decode_list, encode_list};
use crate::keys::{document_key, is_public_entity, is_valid_name, validate_entity_name, ENTITY_TYPES_KEY};
use elysian_store::Document;
use std::collections::BTreeMap;
use tracing::{debug, info};

impl EngineState {
    // === Registry ===

    /// Adds `entity` to the registry. Returns false if it was already there.
    pub(crate) fn register_entity_type(&self, entity: &str) -> bool {
        let _guard = self.types_lock.lock();
        let mut types = self.list_entity_types();
        if types.iter().any(|t| t == entity) {
            return false;
        }
        types.push(entity.to_string());
        self.store.put(ENTITY_TYPES_KEY, encode_list(&types));
        debug!(entity, "entity type registered");
        true
    }

    fn unregister_entity_type(&self, entity: &str) -> bool {
        let _guard = self.types_lock.lock();
        let mut types = self.list_entity_types();
        let before = types.len();
        types.retain(|t| t != entity);
        if types.len() == before {
            return false;
        }
        self.store.put(ENTITY_TYPES_KEY, encode_list(&types));
        true
    }

    pub(crate) fn list_entity_types(&self) -> Vec<String> {
        self.store
            .get(ENTITY_TYPES_KEY)
            .map(|bytes| decode_list(&bytes))
            .unwrap_or_default()
    }

    pub(crate) fn list_public_entity_types(&self) -> Vec<String> {
        self.list_entity_types()
            .into_iter()
            .filter(|t| is_public_entity(t))
            .collect()
    }

    pub(crate) fn entity_type_exists(&self, entity: &str) -> bool {
        self.list_entity_types().iter().any(|t| t == entity)
    }

    pub(crate) fn delete_entity_type(&self, entity: &str) -> CoreResult<bool> {
        validate_entity_name(entity)?;
        self.delete_all_entities(entity)?;
        Ok(self.unregister_entity_type(entity))
    }

    // === Counts ===

    pub(crate) fn count_entities(&self, entity: &str) -> usize {
        if is_valid_name(entity) {
            self.index.count(entity)
        } else {
            0
        }
    }

    pub(crate) fn count_all_entities(&self) -> usize {
        self.list_entity_types()
            .iter()
            .map(|t| self.index.count(t))
            .sum()
    }

    // === Bulk ===

    pub(crate) fn dump_all(&self) -> BTreeMap<String, Vec<Document>> {
        self.list_entity_types()
            .into_iter()
            .map(|entity| {
                let docs = self
                    .index
                    .ids(&entity)
                    .iter()
                    .filter_map(|id| self.store.get_json(&document_key(&entity, id)))
                    .collect();
                (entity, docs)
            })
            .collect()
    }

    pub(crate) fn import_all(&self, data: BTreeMap<String, Vec<Document>>) -> CoreResult<usize> {
        let mut written = 0;
        for (entity, docs) in data {
            for mut doc in docs {
                let errors = self.write_entity(&entity, &mut doc)?;
                if !errors.is_empty() {
                    return Err(CoreError::Validation { errors });
                }
                written += 1;
            }
        }
        info!(documents = written, "import finished");
        Ok(written)
    }

    /// Rebuilds the indexes of every registered type. Returns how many
    /// types were processed.
    pub(crate) fn rebuild_all_indexes(&self) -> usize {
        let types = self.list_entity_types();
        for entity in &types {
            self.rebuild_entity(entity);
        }
        types.len()
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::{Engine, EngineOptions, NativeEngine};
    use crate::keys::CORE_FIELDS_PREFIX;
    use crate::Config;
    use elysian_store::Document;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn doc(v: Value) -> Document {
        match v {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn open(dir: &std::path::Path) -> NativeEngine {
        NativeEngine::open_with(
            Config::new().folder(dir),
            EngineOptions::new().background_tasks(false),
        )
        .unwrap()
    }

    #[test]
    fn registry_keeps_registration_order() {
        let dir = tempdir().unwrap();
        let engine = open(dir.path());
        assert!(engine.create_entity_type("zebras").unwrap());
        assert!(engine.create_entity_type("apples").unwrap());
        assert!(!engine.create_entity_type("zebras").unwrap());
        assert!(engine.create_entity_type("bad:name").is_err());

        let internal = format!("{CORE_FIELDS_PREFIX}user");
        engine.create_entity_type(&internal).unwrap();
        assert_eq!(engine.list_entity_types(), vec!["zebras", "apples", internal.as_str()]);
        assert_eq!(engine.list_public_entity_types(), vec!["zebras", "apples"]);
    }

    #[test]
    fn deleting_a_type_removes_its_documents() {
        let dir = tempdir().unwrap();
        let engine = open(dir.path());
        let mut d = doc(json!({"id": "1"}));
        engine.write_entity("pets", &mut d).unwrap();
        engine.create_index("pets", "name").unwrap();

        assert!(engine.delete_entity_type("pets").unwrap());
        assert!(!engine.entity_type_exists("pets"));
        assert!(!engine.entity_exists("pets", "1"));
        assert!(!engine.delete_entity_type("pets").unwrap());
    }

    #[test]
    fn counts() {
        let dir = tempdir().unwrap();
        let engine = open(dir.path());
        let mut docs = vec![doc(json!({"n": 1})), doc(json!({"n": 2}))];
        engine.write_list_of_entities("a", &mut docs).unwrap();
        let mut d = doc(json!({"n": 3}));
        engine.write_entity("b", &mut d).unwrap();

        assert_eq!(engine.count_entities("a"), 2);
        assert_eq!(engine.count_entities("missing"), 0);
        assert_eq!(engine.count_entities("bad name"), 0);
        assert_eq!(engine.count_all_entities(), 3);
    }

    #[test]
    fn dump_then_import_into_a_fresh_engine() {
        let source_dir = tempdir().unwrap();
        let source = open(source_dir.path());
        for id in ["1", "2"] {
            let mut d = doc(json!({"id": id, "owner": {"@entity": "user", "id": "u1", "name": "Ann"}}));
            source.write_entity("notes", &mut d).unwrap();
        }
        let dump = source.dump_all();
        assert_eq!(dump["notes"].len(), 2);
        assert_eq!(dump["user"].len(), 1);

        let target_dir = tempdir().unwrap();
        let target = open(target_dir.path());
        assert_eq!(target.import_all(dump.clone()).unwrap(), 3);
        assert_eq!(target.dump_all(), dump);
    }

    #[test]
    fn import_stops_at_invalid_names() {
        let dir = tempdir().unwrap();
        let engine = open(dir.path());
        let mut data = BTreeMap::new();
        data.insert("bad name".to_string(), vec![doc(json!({"id": "1"}))]);
        assert!(engine.import_all(data).is_err());
        assert_eq!(engine.count_all_entities(), 0);
    }
}
