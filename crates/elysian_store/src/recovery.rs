//! Append-only recovery logs.
//!
//! Each mutation of a store is appended as one JSON line:
//!
//! ```text
//! {"op":"put","key":"<k>","value":<raw>}
//! {"op":"del","key":"<k>"}
//! ```
//!
//! The file is opened in append mode for every record and closed again, so
//! no descriptor is held between writes. On startup the log is replayed on
//! top of the snapshot and then removed.

use crate::error::StoreResult;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Recovery log of the byte store.
pub const STORE_RECOVERY_FILE: &str = "elysiandb.store.recovery.log";

/// Recovery log of the JSON store.
pub const JSON_RECOVERY_FILE: &str = "elysiandb.json.recovery.log";

/// Kind of logged mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryOp {
    /// Insert or overwrite.
    #[serde(rename = "put")]
    Put,
    /// Removal.
    #[serde(rename = "del")]
    Delete,
}

/// One line of a recovery log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "V: Deserialize<'de>"))]
pub struct RecoveryRecord<V> {
    /// The mutation.
    pub op: RecoveryOp,
    /// The affected key.
    pub key: String,
    /// The new value, for puts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<V>,
    /// Absolute expiry in unix seconds, for byte puts with a TTL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
}

impl<V> RecoveryRecord<V> {
    /// A put record.
    pub fn put(key: impl Into<String>, value: V) -> Self {
        Self {
            op: RecoveryOp::Put,
            key: key.into(),
            value: Some(value),
            ttl: None,
        }
    }

    /// A put record carrying an absolute expiry.
    pub fn put_expiring(key: impl Into<String>, value: V, expires_at: i64) -> Self {
        Self {
            ttl: Some(expires_at),
            ..Self::put(key, value)
        }
    }

    /// A delete record.
    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            op: RecoveryOp::Delete,
            key: key.into(),
            value: None,
            ttl: None,
        }
    }
}

/// Length of the log at a point in time.
///
/// Taken before a snapshot reads the store; once the snapshot is on disk,
/// everything before the checkpoint is covered by it and can be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogCheckpoint(u64);

impl LogCheckpoint {
    /// Byte offset of the checkpoint.
    pub fn offset(self) -> u64 {
        self.0
    }
}

/// A JSON-lines recovery log file.
#[derive(Debug)]
pub struct RecoveryLog {
    path: PathBuf,
    max_bytes: u64,
    lock: Mutex<()>,
}

impl RecoveryLog {
    /// Creates a log at `folder/file_name` rotating at `max_bytes`.
    pub fn new(folder: &Path, file_name: &str, max_bytes: u64) -> Self {
        Self {
            path: folder.join(file_name),
            max_bytes,
            lock: Mutex::new(()),
        }
    }

    /// Returns the log path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current log size, 0 when absent.
    pub fn size(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    /// Encodes one record as a newline-terminated line.
    pub fn encode<V: Serialize>(record: &RecoveryRecord<V>) -> StoreResult<Vec<u8>> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        Ok(line)
    }

    /// Appends one record.
    ///
    /// Returns true when the log has reached its rotation threshold.
    pub fn append<V: Serialize>(&self, record: &RecoveryRecord<V>) -> StoreResult<bool> {
        self.append_encoded(&Self::encode(record)?)
    }

    /// Appends a line produced by [`RecoveryLog::encode`].
    pub fn append_encoded(&self, line: &[u8]) -> StoreResult<bool> {
        let _guard = self.lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line)?;
        let size = file.metadata()?.len();
        Ok(size >= self.max_bytes)
    }

    /// Replays every decodable record through `apply`, then removes the log.
    ///
    /// Blank lines are ignored. Malformed lines, including a torn final
    /// line, are logged and skipped. Returns the number of applied records.
    pub fn replay<V, F>(&self, apply: F) -> StoreResult<usize>
    where
        V: DeserializeOwned,
        F: FnMut(RecoveryRecord<V>),
    {
        let applied = self.replay_in_place(apply)?;
        self.clear()?;
        Ok(applied)
    }

    /// Like [`RecoveryLog::replay`] but leaves the file in place, so the
    /// caller can persist the replayed state before dropping the log.
    pub fn replay_in_place<V, F>(&self, mut apply: F) -> StoreResult<usize>
    where
        V: DeserializeOwned,
        F: FnMut(RecoveryRecord<V>),
    {
        let _guard = self.lock.lock();
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut applied = 0;
        for (number, line) in content.split(|b| *b == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<RecoveryRecord<V>>(line) {
                Ok(record) => {
                    apply(record);
                    applied += 1;
                }
                Err(e) => {
                    warn!(
                        log = %self.path.display(),
                        line = number + 1,
                        error = %e,
                        "skipping malformed recovery log entry"
                    );
                }
            }
        }

        info!(
            log = %self.path.display(),
            "replayed {} recovery log entries", applied
        );
        Ok(applied)
    }

    /// Marks the current end of the log.
    pub fn checkpoint(&self) -> LogCheckpoint {
        let _guard = self.lock.lock();
        LogCheckpoint(self.size())
    }

    /// Drops everything before `checkpoint`, keeping records appended since.
    pub fn truncate_to(&self, checkpoint: LogCheckpoint) -> StoreResult<()> {
        let _guard = self.lock.lock();
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let cut = usize::try_from(checkpoint.0).unwrap_or(usize::MAX);
        if cut >= content.len() {
            remove_if_exists(&self.path)?;
        } else {
            fs::write(&self.path, &content[cut..])?;
        }
        Ok(())
    }

    /// Removes the log file.
    pub fn clear(&self) -> StoreResult<()> {
        let _guard = self.lock.lock();
        remove_if_exists(&self.path)
    }
}

fn remove_if_exists(path: &Path) -> StoreResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
