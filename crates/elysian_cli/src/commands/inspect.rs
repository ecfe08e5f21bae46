//! Inspect command implementation.

use super::Target;
use elysian_core::Engine;
use elysian_store::{
    SnapshotFiles, EXPIRATIONS_FILE, JSON_FILE, JSON_RECOVERY_FILE, STORE_FILE,
    STORE_RECOVERY_FILE,
};
use serde::Serialize;

/// Data folder inspection result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectResult {
    /// Data folder.
    pub folder: String,
    /// Byte store snapshot size in bytes.
    pub store_snapshot_size: u64,
    /// JSON store snapshot size in bytes.
    pub json_snapshot_size: u64,
    /// Expiration snapshot size in bytes.
    pub expirations_snapshot_size: u64,
    /// Byte store recovery log size found before opening.
    pub store_log_size: u64,
    /// JSON store recovery log size found before opening.
    pub json_log_size: u64,
    /// Number of byte keys.
    pub key_count: usize,
    /// Number of keys with a TTL.
    pub expiring_key_count: usize,
    /// Number of JSON documents.
    pub document_count: usize,
    /// Entity types with their document counts (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_types: Option<Vec<EntityTypeStats>>,
}

/// Statistics for one entity type.
#[derive(Debug, Serialize)]
pub struct EntityTypeStats {
    /// Entity type name.
    pub name: String,
    /// Number of documents in its ID list.
    pub documents: usize,
}

/// Collects the statistics of the target folder.
///
/// Recovery log sizes are read before the engine opens, since opening
/// replays and removes them.
pub fn inspect(target: &Target, show_types: bool) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let folder = target.folder()?;
    let files = SnapshotFiles::new(&folder);
    let store_log_size = files.size(STORE_RECOVERY_FILE);
    let json_log_size = files.size(JSON_RECOVERY_FILE);

    let engine = target.open()?;
    let store = engine.store();
    let entity_types = show_types.then(|| {
        engine
            .list_entity_types()
            .into_iter()
            .map(|name| EntityTypeStats {
                documents: engine.count_entities(&name),
                name,
            })
            .collect()
    });

    let result = InspectResult {
        folder: folder.display().to_string(),
        store_snapshot_size: files.size(STORE_FILE),
        json_snapshot_size: files.size(JSON_FILE),
        expirations_snapshot_size: files.size(EXPIRATIONS_FILE),
        store_log_size,
        json_log_size,
        key_count: store.count_keys(),
        expiring_key_count: store.count_expiring_keys(),
        document_count: store.count_json_keys(),
        entity_types,
    };
    engine.shutdown()?;
    Ok(result)
}

/// Runs the inspect command.
pub fn run(target: &Target, show_types: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(target, show_types)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        "text" => print_text(&result),
        other => return Err(format!("unknown format: {other}").into()),
    }
    Ok(())
}

fn print_text(result: &InspectResult) {
    println!("Data folder: {}", result.folder);
    println!();
    println!("Snapshots:");
    println!("  Byte store:  {} bytes", result.store_snapshot_size);
    println!("  JSON store:  {} bytes", result.json_snapshot_size);
    println!("  Expirations: {} bytes", result.expirations_snapshot_size);
    println!();
    println!("Recovery logs (replayed on open):");
    println!("  Byte store: {} bytes", result.store_log_size);
    println!("  JSON store: {} bytes", result.json_log_size);
    println!();
    println!("Contents:");
    println!("  Keys:          {}", result.key_count);
    println!("  Expiring keys: {}", result.expiring_key_count);
    println!("  Documents:     {}", result.document_count);

    if let Some(types) = &result.entity_types {
        println!();
        println!("Entity types:");
        for t in types {
            println!("  {:<24} {}", t.name, t.documents);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn counts_documents_and_pending_logs() {
        let dir = tempdir().unwrap();
        let target = Target::new(Some(dir.path().to_path_buf()), None);
        {
            let engine = target.open().unwrap();
            let mut d = json!({"title": "Dune"}).as_object().cloned().unwrap();
            engine.write_entity("books", &mut d).unwrap();
            std::mem::forget(engine);
        }

        let result = inspect(&target, true).unwrap();
        assert!(result.json_log_size > 0);
        assert_eq!(result.document_count, 1);
        let types = result.entity_types.unwrap();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].name, "books");
        assert_eq!(types[0].documents, 1);

        let again = inspect(&target, false).unwrap();
        assert_eq!(again.json_log_size, 0);
        assert!(again.json_snapshot_size > 0);
        assert!(again.entity_types.is_none());
    }
}
