//! Write path: id assignment, sub-entity extraction, index upkeep.

use super::native::EngineState;
use crate::dirty::PushOutcome;
use crate::error::{CoreError, CoreResult};
use crate::keys::{document_key, is_valid_name, validate_entity_name, ENTITY_NAMESPACE, ENTITY_TYPES_KEY};
use crate::relationship::extract_sub_entities;
use crate::schema::ValidationError;
use elysian_store::Document;
use serde_json::Value;
use std::sync::atomic::Ordering;
use tracing::warn;
use uuid::Uuid;

/// Returns the document id, assigning a fresh UUID when `id` is missing or
/// not a non-empty string.
pub(crate) fn ensure_id(doc: &mut Document) -> String {
    if let Some(id) = doc.get("id").and_then(Value::as_str).filter(|id| !id.is_empty()) {
        return id.to_string();
    }
    let id = Uuid::new_v4().to_string();
    doc.insert("id".to_string(), Value::String(id.clone()));
    id
}

impl EngineState {
    pub(crate) fn write_entity(
        &self,
        entity: &str,
        doc: &mut Document,
    ) -> CoreResult<Vec<ValidationError>> {
        validate_entity_name(entity)?;
        let mut candidate = doc.clone();
        ensure_id(&mut candidate);
        let subs = extract_sub_entities(&mut candidate);
        for sub in &subs {
            validate_entity_name(&sub.entity)?;
        }

        let mut errors = self.validator.validate(entity, &candidate);
        for sub in &subs {
            errors.extend(self.validator.validate(&sub.entity, &sub.document));
        }
        if !errors.is_empty() {
            return Ok(errors);
        }

        for sub in subs {
            self.store_document(&sub.entity, sub.document);
        }
        *doc = candidate;
        self.store_document(entity, doc.clone());
        Ok(Vec::new())
    }

    /// Persists one document that already carries its id.
    fn store_document(&self, entity: &str, doc: Document) {
        let Some(id) = doc.get("id").and_then(Value::as_str).map(String::from) else {
            return;
        };
        self.store.put_json(document_key(entity, &id), doc);
        self.index.add_id(entity, &id);
        self.register_entity_type(entity);
        self.mark_dirty(entity);
        self.purge_cache(entity);
        self.stats.record_writes(1);
    }

    pub(crate) fn update_entity_by_id(
        &self,
        entity: &str,
        id: &str,
        patch: Document,
    ) -> CoreResult<Option<Document>> {
        if !is_valid_name(entity) {
            return Ok(None);
        }
        let Some(mut merged) = self.store.get_json(&document_key(entity, id)) else {
            return Ok(None);
        };
        merged.extend(patch);
        merged.insert("id".to_string(), Value::String(id.to_string()));

        let errors = self.write_entity(entity, &mut merged)?;
        if !errors.is_empty() {
            return Err(CoreError::Validation { errors });
        }
        Ok(Some(merged))
    }

    pub(crate) fn delete_entity_by_id(&self, entity: &str, id: &str) -> bool {
        if !is_valid_name(entity) {
            return false;
        }
        let existed = self.store.delete_json(&document_key(entity, id));
        let listed = self.index.remove_id(entity, id);
        if existed || listed {
            self.mark_dirty(entity);
            self.purge_cache(entity);
        }
        if existed {
            self.stats.record_deletes(1);
        }
        existed
    }

    pub(crate) fn delete_all_entities(&self, entity: &str) -> CoreResult<usize> {
        validate_entity_name(entity)?;
        let removed = self
            .store
            .delete_json_by_prefix(&format!("{ENTITY_NAMESPACE}{entity}:"));
        self.index.remove_entity_indexes(entity)?;
        self.purge_cache(entity);
        self.stats.record_deletes(removed as u64);
        Ok(removed)
    }

    pub(crate) fn delete_all(&self) -> CoreResult<()> {
        let removed = self.store.delete_json_by_prefix(ENTITY_NAMESPACE);
        self.store.delete_by_pattern(&format!("{ENTITY_NAMESPACE}*"))?;
        {
            let _guard = self.types_lock.lock();
            self.store.delete(ENTITY_TYPES_KEY);
        }
        if let Some(cache) = &self.cache {
            cache.purge_all();
        }
        self.stats.record_deletes(removed as u64);
        Ok(())
    }

    // === Index upkeep ===

    /// Queues `entity` for an index rebuild, or rebuilds inline when no
    /// worker will pick it up.
    pub(crate) fn mark_dirty(&self, entity: &str) {
        if !self.workers_running.load(Ordering::Acquire) {
            self.rebuild_entity(entity);
            return;
        }
        match self.dirty.push(entity) {
            PushOutcome::Queued | PushOutcome::Coalesced => {}
            PushOutcome::Full | PushOutcome::Closed => self.rebuild_entity(entity),
        }
    }

    pub(crate) fn rebuild_entity(&self, entity: &str) {
        match self.index.rebuild_entity(entity) {
            Ok(_) => self.stats.record_index_rebuild(),
            Err(e) => {
                self.stats.record_error();
                warn!(entity, error = %e, "index rebuild failed");
            }
        }
    }

    /// Rebuilds whatever is left in the dirty queue on the calling thread.
    pub(crate) fn drain_dirty_queue(&self) {
        while let Some(entity) = self.dirty.try_pop() {
            self.rebuild_entity(&entity);
            self.dirty.done();
        }
    }
}
