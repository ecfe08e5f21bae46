//! Read path: lookups, listings, structured queries and cached responses.

use super::native::{EngineState, ListResponse};
use crate::cache::QueryFingerprint;
use crate::error::CoreResult;
use crate::field::{filter_fields, matches_search};
use crate::filter::leaf_matches;
use crate::include::{apply_includes, extract_auto_includes, merge_includes, Includes};
use crate::keys::{document_key, is_valid_name, validate_entity_name};
use crate::query::{page_window, paginate, ListQuery, Query};
use elysian_store::Document;
use serde_json::Value;
use std::sync::Arc;

impl EngineState {
    pub(crate) fn read_entity_by_id(&self, entity: &str, id: &str) -> Option<Document> {
        if !is_valid_name(entity) {
            return None;
        }
        self.stats.record_read();
        self.store.get_json(&document_key(entity, id))
    }

    pub(crate) fn entity_exists(&self, entity: &str, id: &str) -> bool {
        is_valid_name(entity) && self.store.json_exists(&document_key(entity, id))
    }

    /// Loads the documents behind `ids`, skipping ids whose document is
    /// gone.
    fn read_documents(&self, entity: &str, ids: &[String]) -> Vec<Document> {
        ids.iter()
            .filter_map(|id| self.store.get_json(&document_key(entity, id)))
            .collect()
    }

    fn include(&self, doc: &mut Document, includes: &Includes) {
        let resolve = |entity: &str, id: &str| {
            if is_valid_name(entity) {
                self.store.get_json(&document_key(entity, id))
            } else {
                None
            }
        };
        apply_includes(doc, includes, &resolve);
    }

    pub(crate) fn apply_include_directive(&self, docs: &mut [Document], directive: &str) {
        let Some(includes) = Includes::parse(directive) else {
            return;
        };
        for doc in docs {
            self.include(doc, &includes);
        }
    }

    pub(crate) fn list_entities(&self, query: &ListQuery) -> CoreResult<Vec<Document>> {
        if !is_valid_name(&query.entity) {
            return Ok(Vec::new());
        }
        self.stats.record_query();
        let entity = query.entity.as_str();
        let ids = self.index.get_list_of_ids(entity, query.sort.as_ref())?;

        if query.filters.is_empty() && query.search.is_empty() {
            let mut docs = self.read_documents(entity, page_window(&ids, query.offset, query.limit));
            self.apply_include_directive(&mut docs, &query.includes);
            return Ok(docs);
        }

        let mut docs = self.read_documents(entity, &ids);
        let auto = extract_auto_includes(&query.filters);
        self.apply_include_directive(&mut docs, &merge_includes(&query.includes, &auto));
        docs.retain(|doc| {
            leaf_matches(doc, &query.filters)
                && (query.search.is_empty() || matches_search(doc, &query.search))
        });
        Ok(paginate(docs, query.offset, query.limit))
    }

    pub(crate) fn execute_query(&self, query: &Query) -> CoreResult<Vec<Document>> {
        validate_entity_name(&query.entity)?;
        self.stats.record_query();
        let sort = query.sort_spec();
        let ids = self.index.get_list_of_ids(&query.entity, sort.as_ref())?;
        let mut docs = self.read_documents(&query.entity, &ids);
        if let Some(filter) = &query.filter {
            docs.retain(|doc| filter.matches(doc));
        }
        Ok(paginate(docs, query.offset, query.limit))
    }

    // === Serialized responses ===

    pub(crate) fn list_response(&self, query: &ListQuery) -> CoreResult<ListResponse> {
        let fingerprint = QueryFingerprint::of(query);
        let generation = self.cache.as_ref().map(|c| c.generation(&query.entity));
        if let Some(cache) = &self.cache {
            if let Some(body) = cache.get(&query.entity, &fingerprint) {
                self.stats.record_cache_hit();
                return Ok(ListResponse { body, cached: true });
            }
            self.stats.record_cache_miss();
        }

        let body = if query.count_only {
            let mut unpaged = query.clone();
            unpaged.offset = 0;
            unpaged.limit = 0;
            let count = self.list_entities(&unpaged)?.len();
            let mut out = Document::new();
            out.insert("count".to_string(), Value::from(count));
            serde_json::to_vec(&out)?
        } else {
            let mut docs = self.list_entities(query)?;
            if !query.fields.is_empty() {
                for doc in &mut docs {
                    *doc = filter_fields(doc, &query.fields);
                }
            }
            serde_json::to_vec(&docs)?
        };

        let body: Arc<[u8]> = body.into();
        if let (Some(cache), Some(generation)) = (&self.cache, generation) {
            cache.set(&query.entity, generation, fingerprint, Arc::clone(&body));
        }
        Ok(ListResponse {
            body,
            cached: false,
        })
    }

    pub(crate) fn read_response(&self, entity: &str, id: &str) -> CoreResult<Option<Arc<[u8]>>> {
        let generation = self.cache.as_ref().map(|c| c.generation(entity));
        if let Some(body) = self.cache.as_ref().and_then(|c| c.get_by_id(entity, id)) {
            self.stats.record_cache_hit();
            return Ok(Some(body));
        }
        let Some(doc) = self.read_entity_by_id(entity, id) else {
            return Ok(None);
        };
        let body: Arc<[u8]> = serde_json::to_vec(&doc)?.into();
        if let (Some(cache), Some(generation)) = (&self.cache, generation) {
            self.stats.record_cache_miss();
            cache.set_by_id(entity, generation, id, Arc::clone(&body));
        }
        Ok(Some(body))
    }
}
