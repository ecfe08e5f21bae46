//! Snapshot files in the data folder.

use crate::error::StoreResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Byte store snapshot.
pub const STORE_FILE: &str = "elysiandb.data";

/// JSON store snapshot.
pub const JSON_FILE: &str = "elysiandb.jsondata";

/// Expiration index snapshot.
pub const EXPIRATIONS_FILE: &str = "elysiandb.expirations";

/// Reads and writes whole-store JSON snapshots.
///
/// Files are rewritten in place (truncate, write, fsync). There is no
/// atomic rename; a torn snapshot is repaired by replaying the recovery
/// log, which always precedes the snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotFiles {
    folder: PathBuf,
}

impl SnapshotFiles {
    /// Creates a handle over `folder`.
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    /// Returns the data folder.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Returns the path of `name` inside the data folder.
    pub fn path(&self, name: &str) -> PathBuf {
        self.folder.join(name)
    }

    /// Creates the data folder if needed.
    pub fn ensure_folder(&self) -> StoreResult<()> {
        fs::create_dir_all(&self.folder)?;
        Ok(())
    }

    /// Writes `value` as JSON to `name`, then fsyncs.
    pub fn write<T: Serialize>(&self, name: &str, value: &T) -> StoreResult<()> {
        let file = File::create(self.path(name))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, value)?;
        writer.write_all(b"\n")?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(())
    }

    /// Reads `name`. An absent or blank file yields `T::default()`.
    pub fn read<T: DeserializeOwned + Default>(&self, name: &str) -> StoreResult<T> {
        let bytes = match fs::read(self.path(name)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Size of `name` in bytes, 0 when absent.
    pub fn size(&self, name: &str) -> u64 {
        fs::metadata(self.path(name)).map(|m| m.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn absent_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let files = SnapshotFiles::new(dir.path());
        let map: BTreeMap<String, String> = files.read(STORE_FILE).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn blank_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(JSON_FILE), "  \n").unwrap();
        let files = SnapshotFiles::new(dir.path());
        let map: BTreeMap<String, String> = files.read(JSON_FILE).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let files = SnapshotFiles::new(dir.path().join("nested"));
        files.ensure_folder().unwrap();

        let mut map = BTreeMap::new();
        map.insert("k".to_string(), vec!["a".to_string()]);
        files.write(EXPIRATIONS_FILE, &map).unwrap();

        let back: BTreeMap<String, Vec<String>> = files.read(EXPIRATIONS_FILE).unwrap();
        assert_eq!(back, map);
        assert!(files.size(EXPIRATIONS_FILE) > 0);
    }

    #[test]
    fn rewrite_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let files = SnapshotFiles::new(dir.path());
        let big: BTreeMap<String, String> =
            (0..50).map(|i| (format!("key{i}"), "x".repeat(20))).collect();
        files.write(STORE_FILE, &big).unwrap();
        let small: BTreeMap<String, String> = BTreeMap::new();
        files.write(STORE_FILE, &small).unwrap();

        let back: BTreeMap<String, String> = files.read(STORE_FILE).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn garbage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(STORE_FILE), "{not json").unwrap();
        let files = SnapshotFiles::new(dir.path());
        let result: StoreResult<BTreeMap<String, String>> = files.read(STORE_FILE);
        assert!(result.is_err());
    }
}
