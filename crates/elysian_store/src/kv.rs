//! The key/value facade.
//!
//! [`KvStore`] owns the byte store, the JSON store, the expiration index
//! and both recovery logs. Mutations never fail from the caller's point of
//! view: log and snapshot I/O errors are reported through `tracing` and the
//! store stays dirty so the next flush retries. Callers that need a
//! durability signal call [`KvStore::write_to_db`].

use crate::config::StoreConfig;
use crate::encoding::{Base64Bytes, Base64Ref};
use crate::error::StoreResult;
use crate::expiration::{unix_now, ExpirationIndex};
use crate::glob::GlobPattern;
use crate::recovery::{
    RecoveryLog, RecoveryOp, RecoveryRecord, JSON_RECOVERY_FILE, STORE_RECOVERY_FILE,
};
use crate::shard::ShardedStore;
use crate::snapshot::{SnapshotFiles, EXPIRATIONS_FILE, JSON_FILE, STORE_FILE};
use crate::Document;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// Sharded byte and JSON stores with snapshots, TTLs and recovery logs.
#[derive(Debug)]
pub struct KvStore {
    config: StoreConfig,
    files: SnapshotFiles,
    bytes: ShardedStore<Vec<u8>>,
    json: ShardedStore<Document>,
    expirations: ExpirationIndex,
    bytes_log: Option<RecoveryLog>,
    json_log: Option<RecoveryLog>,
    bytes_flush: Mutex<()>,
    json_flush: Mutex<()>,
    rotating: AtomicBool,
}

impl KvStore {
    /// Opens the store in `config.folder`.
    ///
    /// Loads the three snapshot files, replays the JSON then the byte
    /// recovery log on top of them, removes the logs, and drops keys whose
    /// TTL has already passed.
    ///
    /// # Errors
    ///
    /// Fails on an invalid shard count, an unreadable folder, or a snapshot
    /// file that is not valid JSON of the expected shape.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let files = SnapshotFiles::new(&config.folder);
        files.ensure_folder()?;

        let (bytes_log, json_log) = if config.crash_recovery.enabled {
            let max = config.max_log_bytes();
            (
                Some(RecoveryLog::new(files.folder(), STORE_RECOVERY_FILE, max)),
                Some(RecoveryLog::new(files.folder(), JSON_RECOVERY_FILE, max)),
            )
        } else {
            (None, None)
        };

        let store = Self {
            bytes: ShardedStore::new(config.shards)?,
            json: ShardedStore::new(config.shards)?,
            expirations: ExpirationIndex::new(),
            files,
            bytes_log,
            json_log,
            config,
            bytes_flush: Mutex::new(()),
            json_flush: Mutex::new(()),
            rotating: AtomicBool::new(false),
        };
        store.load_from_disk()?;
        Ok(store)
    }

    fn load_from_disk(&self) -> StoreResult<()> {
        let bytes: BTreeMap<String, Base64Bytes> = self.files.read(STORE_FILE)?;
        self.bytes
            .load_map(bytes.into_iter().map(|(k, v)| (k, v.into_inner())));

        let expirations: BTreeMap<String, Vec<String>> = self.files.read(EXPIRATIONS_FILE)?;
        for bucket in self.expirations.load_map(expirations) {
            warn!(bucket = %bucket, "ignoring expiration bucket with a non-numeric timestamp");
        }

        let json: BTreeMap<String, Document> = self.files.read(JSON_FILE)?;
        self.json.load_map(json);

        info!(
            folder = %self.files.folder().display(),
            keys = self.bytes.len(),
            documents = self.json.len(),
            expiring = self.expirations.len(),
            "loaded store snapshots"
        );

        let mut replayed = 0;
        if let Some(log) = &self.json_log {
            replayed += log.replay_in_place(|record: RecoveryRecord<Document>| {
                match (record.op, record.value) {
                    (RecoveryOp::Put, Some(doc)) => {
                        self.json.put(record.key, doc);
                    }
                    _ => {
                        self.json.delete(&record.key);
                    }
                }
            })?;
        }

        if let Some(log) = &self.bytes_log {
            let now = unix_now();
            replayed += log.replay_in_place(|record: RecoveryRecord<Base64Bytes>| {
                match (record.op, record.value) {
                    (RecoveryOp::Put, Some(value)) => match record.ttl {
                        Some(expires_at) if now >= expires_at => {}
                        Some(expires_at) => {
                            self.bytes.put(record.key.clone(), value.into_inner());
                            self.expirations.put(expires_at, [record.key]);
                        }
                        None => {
                            self.bytes.put(record.key, value.into_inner());
                        }
                    },
                    _ => {
                        self.bytes.delete(&record.key);
                        self.expirations.del(&record.key);
                    }
                }
            })?;
        }

        self.clean_all_past_keys();

        if replayed > 0 {
            self.write_to_db()?;
        }
        for log in self.bytes_log.iter().chain(self.json_log.iter()) {
            log.clear()?;
        }
        Ok(())
    }

    /// Returns the configuration the store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the snapshot file handle.
    pub fn files(&self) -> &SnapshotFiles {
        &self.files
    }

    // === Byte store ===

    /// Reads a byte value. Expired keys are deleted and reported absent.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        if self.key_has_expired(key) {
            self.delete(key);
            return None;
        }
        self.bytes.get(key)
    }

    /// Returns true if a live byte value exists under `key`.
    pub fn exists(&self, key: &str) -> bool {
        !self.key_has_expired(key) && self.bytes.contains_key(key)
    }

    /// Writes a byte value. An existing TTL on `key` is kept.
    pub fn put(&self, key: impl Into<String>, value: Vec<u8>) {
        let key = key.into();
        let line = self
            .bytes_log
            .as_ref()
            .map(|_| RecoveryLog::encode(&RecoveryRecord::put(key.as_str(), Base64Ref(&value))));
        self.bytes.put(key, value);
        self.log_bytes(line);
    }

    /// Writes a byte value that expires `ttl_seconds` from now.
    ///
    /// A non-positive TTL behaves like [`KvStore::put`].
    pub fn put_with_ttl(&self, key: impl Into<String>, value: Vec<u8>, ttl_seconds: i64) {
        if ttl_seconds <= 0 {
            self.put(key, value);
            return;
        }
        let key = key.into();
        let expires_at = unix_now() + ttl_seconds;
        let line = self.bytes_log.as_ref().map(|_| {
            RecoveryLog::encode(&RecoveryRecord::put_expiring(
                key.as_str(),
                Base64Ref(&value),
                expires_at,
            ))
        });
        self.bytes.put(key.clone(), value);
        self.expirations.put(expires_at, [key]);
        self.log_bytes(line);
    }

    /// Deletes a byte value and its TTL. Returns true if it existed.
    pub fn delete(&self, key: &str) -> bool {
        self.expirations.del(key);
        let existed = self.bytes.delete(key).is_some();
        let line = self
            .bytes_log
            .as_ref()
            .map(|_| RecoveryLog::encode(&RecoveryRecord::<Base64Bytes>::delete(key)));
        self.log_bytes(line);
        existed
    }

    /// Returns live byte values whose keys match the glob `pattern`.
    ///
    /// A non-positive `limit` means no limit.
    pub fn get_by_pattern(
        &self,
        pattern: &str,
        limit: i64,
    ) -> StoreResult<BTreeMap<String, Vec<u8>>> {
        let glob = GlobPattern::new(pattern)?;
        let mut keys = self.bytes.keys_matching(|k| glob.is_match(k));
        keys.sort();
        let mut out = BTreeMap::new();
        for key in keys {
            if limit > 0 && out.len() as i64 >= limit {
                break;
            }
            if let Some(value) = self.get(&key) {
                out.insert(key, value);
            }
        }
        Ok(out)
    }

    /// Deletes every byte key matching the glob `pattern` at the time of the
    /// call. Returns how many were deleted.
    pub fn delete_by_pattern(&self, pattern: &str) -> StoreResult<usize> {
        let glob = GlobPattern::new(pattern)?;
        let keys = self.bytes.keys_matching(|k| glob.is_match(k));
        Ok(keys.iter().filter(|k| self.delete(k)).count())
    }

    /// Returns true if `key` has a TTL that has been reached.
    pub fn key_has_expired(&self, key: &str) -> bool {
        self.expirations.has_expired(key, unix_now())
    }

    /// Expiry second of `key`, if it has a TTL.
    pub fn expires_at(&self, key: &str) -> Option<i64> {
        self.expirations.expires_at(key)
    }

    /// Deletes every key in the bucket at `expires_at`, then drops the bucket.
    ///
    /// Best-effort: the bucket is dropped even if a key was already gone.
    pub fn clean_expired_bucket(&self, expires_at: i64) -> usize {
        let keys = self.expirations.bucket_keys(expires_at);
        let removed = keys.iter().filter(|k| self.delete(k)).count();
        self.expirations.drop_bucket(expires_at);
        removed
    }

    /// Sweeps every bucket strictly before now. Returns the deleted count.
    pub fn clean_all_past_keys(&self) -> usize {
        let removed: usize = self
            .expirations
            .due_buckets(unix_now())
            .into_iter()
            .map(|ts| self.clean_expired_bucket(ts))
            .sum();
        if removed > 0 {
            debug!(removed, "expired keys removed");
        }
        removed
    }

    // === JSON store ===

    /// Reads a copy of a document.
    pub fn get_json(&self, key: &str) -> Option<Document> {
        self.json.get(key)
    }

    /// Runs `f` against a document without copying it.
    pub fn with_json<R>(&self, key: &str, f: impl FnOnce(&Document) -> R) -> Option<R> {
        self.json.with_value(key, f)
    }

    /// Returns true if a document exists under `key`.
    pub fn json_exists(&self, key: &str) -> bool {
        self.json.contains_key(key)
    }

    /// Writes a document.
    pub fn put_json(&self, key: impl Into<String>, doc: Document) {
        let key = key.into();
        let line = self
            .json_log
            .as_ref()
            .map(|_| RecoveryLog::encode(&RecoveryRecord::put(key.as_str(), &doc)));
        self.json.put(key, doc);
        self.log_json(line);
    }

    /// Deletes a document. Returns true if it existed.
    pub fn delete_json(&self, key: &str) -> bool {
        let existed = self.json.delete(key).is_some();
        let line = self
            .json_log
            .as_ref()
            .map(|_| RecoveryLog::encode(&RecoveryRecord::<Document>::delete(key)));
        self.log_json(line);
        existed
    }

    /// Deletes every document whose key starts with `prefix` (a trailing `*`
    /// is ignored). Keys are collected first, then deleted one by one, so a
    /// key written concurrently may or may not be removed.
    pub fn delete_json_by_prefix(&self, prefix: &str) -> usize {
        let keys = self.json_keys_with_prefix(prefix);
        keys.iter().filter(|k| self.delete_json(k)).count()
    }

    /// Collects the document keys starting with `prefix` (trailing `*`
    /// ignored).
    pub fn json_keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let prefix = prefix.strip_suffix('*').unwrap_or(prefix);
        self.json.keys_matching(|k| k.starts_with(prefix))
    }

    /// Visits every document.
    pub fn iterate_json(&self, f: impl FnMut(&str, &Document)) {
        self.json.iterate(f);
    }

    // === Counts ===

    /// Number of byte keys.
    pub fn count_keys(&self) -> usize {
        self.bytes.len()
    }

    /// Number of documents.
    pub fn count_json_keys(&self) -> usize {
        self.json.len()
    }

    /// Number of keys with a TTL.
    pub fn count_expiring_keys(&self) -> usize {
        self.expirations.len()
    }

    /// Sizes of the byte and JSON recovery logs.
    pub fn recovery_log_sizes(&self) -> (u64, u64) {
        (
            self.bytes_log.as_ref().map_or(0, RecoveryLog::size),
            self.json_log.as_ref().map_or(0, RecoveryLog::size),
        )
    }

    /// Returns true if both stores and the expirations are on disk.
    pub fn is_saved(&self) -> bool {
        self.bytes.is_saved() && self.expirations.is_saved() && self.json.is_saved()
    }

    // === Snapshots ===

    /// Snapshots every store whose contents changed since its last snapshot.
    ///
    /// Both halves are attempted; the first error is returned.
    pub fn write_to_db(&self) -> StoreResult<()> {
        let bytes = self.write_store_db();
        let json = self.write_json_db();
        bytes.and(json)
    }

    /// Snapshots the byte store and expirations, then drops the covered
    /// part of the byte recovery log.
    pub fn write_store_db(&self) -> StoreResult<()> {
        let _guard = self.bytes_flush.lock();
        if self.bytes.is_saved() && self.expirations.is_saved() {
            return Ok(());
        }

        let checkpoint = self.bytes_log.as_ref().map(RecoveryLog::checkpoint);
        let bytes_generation = self.bytes.snapshot_generation();
        let expirations_generation = self.expirations.snapshot_generation();

        let snapshot: BTreeMap<String, Base64Bytes> = self
            .bytes
            .to_map()
            .into_iter()
            .map(|(k, v)| (k, Base64Bytes(v)))
            .collect();
        self.files.write(STORE_FILE, &snapshot).inspect_err(|e| {
            error!(error = %e, "failed to write byte store snapshot");
        })?;
        self.files
            .write(EXPIRATIONS_FILE, &self.expirations.to_map())
            .inspect_err(|e| {
                error!(error = %e, "failed to write expirations snapshot");
            })?;

        self.bytes.mark_saved(bytes_generation);
        self.expirations.mark_saved(expirations_generation);
        if let (Some(log), Some(checkpoint)) = (&self.bytes_log, checkpoint) {
            log.truncate_to(checkpoint)?;
        }
        debug!(keys = snapshot.len(), "byte store snapshot written");
        Ok(())
    }

    /// Snapshots the JSON store, then drops the covered part of the JSON
    /// recovery log.
    pub fn write_json_db(&self) -> StoreResult<()> {
        let _guard = self.json_flush.lock();
        if self.json.is_saved() {
            return Ok(());
        }

        let checkpoint = self.json_log.as_ref().map(RecoveryLog::checkpoint);
        let generation = self.json.snapshot_generation();
        let snapshot = self.json.to_map();
        self.files.write(JSON_FILE, &snapshot).inspect_err(|e| {
            error!(error = %e, "failed to write JSON store snapshot");
        })?;

        self.json.mark_saved(generation);
        if let (Some(log), Some(checkpoint)) = (&self.json_log, checkpoint) {
            log.truncate_to(checkpoint)?;
        }
        debug!(documents = snapshot.len(), "JSON store snapshot written");
        Ok(())
    }

    /// Empties both stores and the expirations and removes the recovery logs.
    pub fn reset(&self) {
        self.bytes.clear();
        self.json.clear();
        self.expirations.reset();
        for log in self.bytes_log.iter().chain(self.json_log.iter()) {
            if let Err(e) = log.clear() {
                error!(log = %log.path().display(), error = %e, "failed to clear recovery log");
            }
        }
        info!("store has been reset");
    }

    // === Recovery logging ===
    //
    // Records are encoded before the shard mutation and appended after it.
    // A snapshot checkpoint taken before `to_map` therefore only ever covers
    // lines whose mutation the snapshot has already seen.

    fn log_bytes(&self, line: Option<StoreResult<Vec<u8>>>) {
        let (Some(log), Some(line)) = (&self.bytes_log, line) else {
            return;
        };
        match line.and_then(|l| log.append_encoded(&l)) {
            Ok(true) => self.rotate(|| self.write_store_db()),
            Ok(false) => {}
            Err(e) => error!(error = %e, "failed to append to byte store recovery log"),
        }
    }

    fn log_json(&self, line: Option<StoreResult<Vec<u8>>>) {
        let (Some(log), Some(line)) = (&self.json_log, line) else {
            return;
        };
        match line.and_then(|l| log.append_encoded(&l)) {
            Ok(true) => self.rotate(|| self.write_json_db()),
            Ok(false) => {}
            Err(e) => error!(error = %e, "failed to append to JSON store recovery log"),
        }
    }

    fn rotate(&self, snapshot: impl FnOnce() -> StoreResult<()>) {
        if self.rotating.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("recovery log reached its size limit, writing snapshot");
        if let Err(e) = snapshot() {
            error!(error = %e, "snapshot after recovery log rotation failed");
        }
        self.rotating.store(false, Ordering::Release);
    }
}
