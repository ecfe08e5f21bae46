//! Native engine over the sharded key/value store.

use super::background::Background;
use super::Engine;
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::dirty::DirtyQueue;
use crate::error::{CoreError, CoreResult};
use crate::index::IndexManager;
use crate::keys::validate_entity_name;
use crate::query::{ListQuery, Query};
use crate::schema::{AcceptAll, SchemaValidator, ValidationError};
use crate::stats::{EngineStats, StatsSnapshot};
use crate::transaction::{Transaction, TransactionManager, TransactionOperation};
use elysian_store::{Document, KvStore};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// How a [`NativeEngine`] is opened.
#[derive(Clone)]
pub struct EngineOptions {
    /// Start the flusher, expiration sweeper, index workers and cache
    /// cleaner. Without them, index rebuilds run inline on every write.
    pub background_tasks: bool,
    /// Validator consulted before every write.
    pub validator: Arc<dyn SchemaValidator>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            background_tasks: true,
            validator: Arc::new(AcceptAll),
        }
    }
}

impl EngineOptions {
    /// Default options: background tasks on, every document accepted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables background tasks.
    #[must_use]
    pub fn background_tasks(mut self, enabled: bool) -> Self {
        self.background_tasks = enabled;
        self
    }

    /// Sets the schema validator.
    #[must_use]
    pub fn validator(mut self, validator: impl SchemaValidator + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }
}

impl std::fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineOptions")
            .field("background_tasks", &self.background_tasks)
            .finish_non_exhaustive()
    }
}

/// A serialized list response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResponse {
    /// JSON body: an array of documents or `{"count": n}`.
    pub body: Arc<[u8]>,
    /// Whether the body came from the response cache.
    pub cached: bool,
}

/// State shared between the engine handle and its background threads.
pub(crate) struct EngineState {
    pub(crate) config: RwLock<Config>,
    pub(crate) store: Arc<KvStore>,
    pub(crate) index: IndexManager,
    pub(crate) dirty: DirtyQueue,
    pub(crate) cache: Option<ResponseCache>,
    pub(crate) stats: EngineStats,
    pub(crate) validator: Arc<dyn SchemaValidator>,
    pub(crate) transactions: TransactionManager,
    /// Serializes updates of the entity type registry.
    pub(crate) types_lock: Mutex<()>,
    /// True while index workers are consuming the dirty queue.
    pub(crate) workers_running: AtomicBool,
}

impl EngineState {
    fn new(config: Config, store: Arc<KvStore>, validator: Arc<dyn SchemaValidator>) -> Self {
        let cache = config
            .api
            .cache
            .enabled
            .then(|| ResponseCache::new(Duration::from_secs(config.api.cache.cleanup_interval_seconds)));
        Self {
            index: IndexManager::new(Arc::clone(&store)),
            dirty: DirtyQueue::new(config.api.index.queue_capacity),
            cache,
            stats: EngineStats::new(),
            validator,
            transactions: TransactionManager::new(),
            types_lock: Mutex::new(()),
            workers_running: AtomicBool::new(false),
            store,
            config: RwLock::new(config),
        }
    }

    pub(crate) fn purge_cache(&self, entity: &str) {
        if let Some(cache) = &self.cache {
            cache.purge(entity);
        }
    }

    /// Snapshots both stores, counting the outcome.
    pub(crate) fn snapshot(&self) -> CoreResult<()> {
        match self.store.write_to_db() {
            Ok(()) => {
                self.stats.record_snapshot();
                Ok(())
            }
            Err(e) => {
                self.stats.record_error();
                Err(e.into())
            }
        }
    }
}

/// The native [`Engine`].
///
/// Owns the store, the index manager, the response cache, the transaction
/// buffer and the background threads. Dropping the engine shuts it down.
///
/// ```rust,ignore
/// use elysian_core::{Config, Engine, ListQuery, NativeEngine};
///
/// let engine = NativeEngine::open(Config::new().folder("data"))?;
/// let mut doc = serde_json::json!({"title": "Dune"}).as_object().cloned().unwrap();
/// engine.write_entity("books", &mut doc)?;
/// let books = engine.list_entities(&ListQuery::new("books").sort("title", true))?;
/// engine.shutdown()?;
/// ```
pub struct NativeEngine {
    shared: Arc<EngineState>,
    background: Mutex<Option<Background>>,
    closed: AtomicBool,
}

impl NativeEngine {
    /// Opens an engine with default options.
    pub fn open(config: Config) -> CoreResult<Self> {
        Self::open_with(config, EngineOptions::default())
    }

    /// Opens an engine.
    ///
    /// Loads the snapshots and replays the recovery logs, rebuilds every
    /// sort index, then starts the background tasks if requested.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration, an unusable data folder, a
    /// corrupted snapshot, or when a background thread cannot be spawned.
    pub fn open_with(config: Config, options: EngineOptions) -> CoreResult<Self> {
        config.validate()?;
        let store = Arc::new(KvStore::open(config.store.clone())?);
        let shared = Arc::new(EngineState::new(config, store, options.validator));

        let rebuilt = shared.rebuild_all_indexes();
        info!(
            documents = shared.store.count_json_keys(),
            keys = shared.store.count_keys(),
            entity_types = rebuilt,
            "engine opened"
        );

        let background = if options.background_tasks {
            Some(Background::spawn(&shared)?)
        } else {
            None
        };

        Ok(Self {
            shared,
            background: Mutex::new(background),
            closed: AtomicBool::new(false),
        })
    }

    /// A copy of the configuration in use.
    pub fn config(&self) -> Config {
        self.shared.config.read().clone()
    }

    /// The underlying key/value store.
    pub fn store(&self) -> &KvStore {
        &self.shared.store
    }

    /// The live counters.
    pub fn engine_stats(&self) -> &EngineStats {
        &self.shared.stats
    }

    /// Returns true once [`NativeEngine::shutdown`] has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_closed() {
            Err(CoreError::EngineClosed)
        } else {
            Ok(())
        }
    }

    /// Waits until every queued index rebuild has finished. Returns false on
    /// timeout.
    pub fn wait_for_indexes(&self, timeout: Duration) -> bool {
        self.shared.dirty.wait_idle(timeout)
    }

    /// Stops the background tasks, finishes pending index rebuilds and
    /// writes a final snapshot. Later calls do nothing.
    pub fn shutdown(&self) -> CoreResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(background) = self.background.lock().take() {
            background.shutdown(&self.shared);
        }
        self.shared.dirty.close();
        self.shared.drain_dirty_queue();
        self.shared.snapshot()?;
        info!("engine shut down");
        Ok(())
    }

    // === Responses ===

    /// Lists documents as a JSON body, through the response cache.
    ///
    /// `count_only` yields `{"count": n}`; a field projection keeps only the
    /// listed paths (and `id`).
    pub fn list_response(&self, query: &ListQuery) -> CoreResult<ListResponse> {
        self.shared.list_response(query)
    }

    /// Reads document `id` as a JSON body, through the response cache.
    pub fn read_response(&self, entity: &str, id: &str) -> CoreResult<Option<Arc<[u8]>>> {
        self.shared.read_response(entity, id)
    }

    // === Transactions ===

    /// Opens a transaction.
    pub fn begin_transaction(&self) -> CoreResult<String> {
        self.ensure_open()?;
        self.shared.stats.record_transaction_start();
        Ok(self.shared.transactions.begin())
    }

    /// Stages an operation in transaction `id`.
    pub fn add_operation(&self, id: &str, operation: TransactionOperation) -> CoreResult<()> {
        self.shared.transactions.add_operation(id, operation)
    }

    /// Returns a copy of open transaction `id`.
    pub fn transaction(&self, id: &str) -> Option<Transaction> {
        self.shared.transactions.get(id)
    }

    /// Applies transaction `id`. Returns the number of operations applied.
    pub fn commit_transaction(&self, id: &str) -> CoreResult<usize> {
        self.ensure_open()?;
        match self.shared.transactions.commit(id, self) {
            Ok(count) => {
                self.shared.stats.record_transaction_commit();
                Ok(count)
            }
            Err(e) => {
                self.shared.stats.record_error();
                Err(e)
            }
        }
    }

    /// Discards transaction `id`. Returns false if it did not exist.
    pub fn rollback_transaction(&self, id: &str) -> bool {
        let existed = self.shared.transactions.rollback(id);
        if existed {
            self.shared.stats.record_transaction_rollback();
        }
        existed
    }
}

impl Engine for NativeEngine {
    fn write_entity(&self, entity: &str, doc: &mut Document) -> CoreResult<Vec<ValidationError>> {
        self.ensure_open()?;
        self.shared.write_entity(entity, doc)
    }

    fn write_list_of_entities(
        &self,
        entity: &str,
        docs: &mut [Document],
    ) -> CoreResult<Vec<Vec<ValidationError>>> {
        self.ensure_open()?;
        docs.iter_mut()
            .map(|doc| self.shared.write_entity(entity, doc))
            .collect()
    }

    fn update_entity_by_id(
        &self,
        entity: &str,
        id: &str,
        patch: Document,
    ) -> CoreResult<Option<Document>> {
        self.ensure_open()?;
        self.shared.update_entity_by_id(entity, id, patch)
    }

    fn update_list_of_entities(
        &self,
        entity: &str,
        patches: Vec<Document>,
    ) -> CoreResult<Vec<Document>> {
        self.ensure_open()?;
        let mut updated = Vec::with_capacity(patches.len());
        for patch in patches {
            let Some(id) = patch.get("id").and_then(|v| v.as_str()).map(String::from) else {
                continue;
            };
            if let Some(doc) = self.shared.update_entity_by_id(entity, &id, patch)? {
                updated.push(doc);
            }
        }
        Ok(updated)
    }

    fn delete_entity_by_id(&self, entity: &str, id: &str) -> bool {
        !self.is_closed() && self.shared.delete_entity_by_id(entity, id)
    }

    fn delete_all_entities(&self, entity: &str) -> CoreResult<usize> {
        self.ensure_open()?;
        self.shared.delete_all_entities(entity)
    }

    fn delete_all(&self) -> CoreResult<()> {
        self.ensure_open()?;
        self.shared.delete_all()
    }

    fn read_entity_by_id(&self, entity: &str, id: &str) -> Option<Document> {
        self.shared.read_entity_by_id(entity, id)
    }

    fn entity_exists(&self, entity: &str, id: &str) -> bool {
        self.shared.entity_exists(entity, id)
    }

    fn list_entities(&self, query: &ListQuery) -> CoreResult<Vec<Document>> {
        self.shared.list_entities(query)
    }

    fn execute_query(&self, query: &Query) -> CoreResult<Vec<Document>> {
        self.shared.execute_query(query)
    }

    fn apply_includes(&self, docs: &mut [Document], directive: &str) {
        self.shared.apply_include_directive(docs, directive);
    }

    fn count_entities(&self, entity: &str) -> usize {
        self.shared.count_entities(entity)
    }

    fn count_all_entities(&self) -> usize {
        self.shared.count_all_entities()
    }

    fn entity_type_exists(&self, entity: &str) -> bool {
        self.shared.entity_type_exists(entity)
    }

    fn create_entity_type(&self, entity: &str) -> CoreResult<bool> {
        self.ensure_open()?;
        validate_entity_name(entity)?;
        Ok(self.shared.register_entity_type(entity))
    }

    fn delete_entity_type(&self, entity: &str) -> CoreResult<bool> {
        self.ensure_open()?;
        self.shared.delete_entity_type(entity)
    }

    fn list_entity_types(&self) -> Vec<String> {
        self.shared.list_entity_types()
    }

    fn list_public_entity_types(&self) -> Vec<String> {
        self.shared.list_public_entity_types()
    }

    fn dump_all(&self) -> BTreeMap<String, Vec<Document>> {
        self.shared.dump_all()
    }

    fn import_all(&self, data: BTreeMap<String, Vec<Document>>) -> CoreResult<usize> {
        self.ensure_open()?;
        self.shared.import_all(data)
    }

    fn create_index(&self, entity: &str, field: &str) -> CoreResult<()> {
        self.shared.index.create_indexes_for_field(entity, field)?;
        self.shared.purge_cache(entity);
        Ok(())
    }

    fn delete_index(&self, entity: &str, field: &str) -> CoreResult<()> {
        self.shared.index.delete_indexes_for_field(entity, field)?;
        self.shared.purge_cache(entity);
        Ok(())
    }

    fn stats(&self) -> StatsSnapshot {
        self.shared
            .stats
            .snapshot(self.shared.store.count_json_keys() as u64)
    }

    fn flush(&self) -> CoreResult<()> {
        self.shared.snapshot()
    }
}

impl std::fmt::Debug for NativeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeEngine")
            .field("folder", &self.shared.store.config().folder)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Drop for NativeEngine {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!(error = %e, "final snapshot failed");
        }
    }
}
