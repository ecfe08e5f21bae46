//! The engine interface and its native implementation.
//!
//! [`Engine`] is everything a transport layer may call. It is object safe
//! so a second backend can be substituted behind `dyn Engine`;
//! [`NativeEngine`] implements it over the sharded [`KvStore`].
//!
//! [`KvStore`]: elysian_store::KvStore

mod background;
mod native;
mod read;
mod types;
mod write;

pub use native::{EngineOptions, ListResponse, NativeEngine};

use crate::error::CoreResult;
use crate::query::{ListQuery, Query};
use crate::schema::ValidationError;
use crate::stats::StatsSnapshot;
use elysian_store::Document;
use std::collections::BTreeMap;

/// Operations offered to the transport layer.
///
/// Absence is reported as `None` or `false`, never as an error. Invalid
/// entity names behave as absent on reads and fail with
/// [`CoreError::InvalidName`](crate::CoreError::InvalidName) on writes.
pub trait Engine: Send + Sync {
    // === Writes ===

    /// Stores `doc` under `entity`, assigning an `id` when it has none and
    /// moving embedded entities into their own records. On success `doc`
    /// holds the stored form.
    ///
    /// A non-empty result means the schema validator rejected the document
    /// and nothing was written.
    fn write_entity(&self, entity: &str, doc: &mut Document) -> CoreResult<Vec<ValidationError>>;

    /// Writes each document in turn. Returns one diagnostics list per
    /// document.
    fn write_list_of_entities(
        &self,
        entity: &str,
        docs: &mut [Document],
    ) -> CoreResult<Vec<Vec<ValidationError>>>;

    /// Shallow-merges `patch` into document `id` and stores the result.
    /// Returns `None` if the document does not exist.
    fn update_entity_by_id(
        &self,
        entity: &str,
        id: &str,
        patch: Document,
    ) -> CoreResult<Option<Document>>;

    /// Applies each patch to the document named by its `id` field. Patches
    /// without an id or without a matching document are skipped.
    fn update_list_of_entities(
        &self,
        entity: &str,
        patches: Vec<Document>,
    ) -> CoreResult<Vec<Document>>;

    /// Deletes document `id`. Returns true if it existed.
    fn delete_entity_by_id(&self, entity: &str, id: &str) -> bool;

    /// Deletes every document and index of `entity`. Returns the number of
    /// documents removed.
    fn delete_all_entities(&self, entity: &str) -> CoreResult<usize>;

    /// Deletes every document, index and entity type.
    fn delete_all(&self) -> CoreResult<()>;

    // === Reads ===

    /// Reads document `id`.
    fn read_entity_by_id(&self, entity: &str, id: &str) -> Option<Document>;

    /// Returns true if document `id` exists.
    fn entity_exists(&self, entity: &str, id: &str) -> bool;

    /// Lists documents with sort, filters, search, pagination and includes.
    fn list_entities(&self, query: &ListQuery) -> CoreResult<Vec<Document>>;

    /// Runs a structured query.
    fn execute_query(&self, query: &Query) -> CoreResult<Vec<Document>>;

    /// Expands links in `docs` according to an include directive.
    fn apply_includes(&self, docs: &mut [Document], directive: &str);

    /// Number of documents of `entity`.
    fn count_entities(&self, entity: &str) -> usize;

    /// Number of documents across every entity type.
    fn count_all_entities(&self) -> usize;

    // === Entity types ===

    /// Returns true if `entity` is registered.
    fn entity_type_exists(&self, entity: &str) -> bool;

    /// Registers `entity`. Returns false if it already was.
    fn create_entity_type(&self, entity: &str) -> CoreResult<bool>;

    /// Deletes every document of `entity` and unregisters it. Returns false
    /// if it was not registered.
    fn delete_entity_type(&self, entity: &str) -> CoreResult<bool>;

    /// Registered entity types, in registration order.
    fn list_entity_types(&self) -> Vec<String>;

    /// Registered entity types without the engine's own.
    fn list_public_entity_types(&self) -> Vec<String>;

    // === Bulk ===

    /// Every document of every registered type.
    fn dump_all(&self) -> BTreeMap<String, Vec<Document>>;

    /// Writes every document through [`Engine::write_entity`]. Returns the
    /// number written; stops at the first rejected document.
    fn import_all(&self, data: BTreeMap<String, Vec<Document>>) -> CoreResult<usize>;

    // === Indexes and maintenance ===

    /// Builds the sort indexes of `field` now.
    fn create_index(&self, entity: &str, field: &str) -> CoreResult<()>;

    /// Drops the sort indexes of `field`.
    fn delete_index(&self, entity: &str, field: &str) -> CoreResult<()>;

    /// Current counters.
    fn stats(&self) -> StatsSnapshot;

    /// Snapshots both stores to disk.
    fn flush(&self) -> CoreResult<()>;
}
