//! Import command implementation.

use super::Target;
use elysian_core::{Document, Engine};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Runs the import command. Returns the number of documents written.
pub fn run(target: &Target, input: &Path) -> Result<usize, Box<dyn std::error::Error>> {
    let reader = BufReader::new(File::open(input)?);
    let data: BTreeMap<String, Vec<Document>> = serde_json::from_reader(reader)?;

    let engine = target.open()?;
    let written = engine.import_all(data)?;
    engine.shutdown()?;
    println!("Imported {written} documents");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::dump;
    use tempfile::tempdir;

    #[test]
    fn dump_then_import_into_another_folder() {
        let source = tempdir().unwrap();
        let source_target = Target::new(Some(source.path().to_path_buf()), None);
        {
            let engine = source_target.open().unwrap();
            let mut d = serde_json::json!({"id": "1", "title": "Dune"})
                .as_object()
                .cloned()
                .unwrap();
            engine.write_entity("books", &mut d).unwrap();
            engine.shutdown().unwrap();
        }

        let dump_file = source.path().join("dump.json");
        dump::run(&source_target, Some(&dump_file), true).unwrap();

        let dest = tempdir().unwrap();
        let dest_target = Target::new(Some(dest.path().to_path_buf()), None);
        assert_eq!(run(&dest_target, &dump_file).unwrap(), 1);

        let engine = dest_target.open().unwrap();
        assert_eq!(engine.read_entity_by_id("books", "1").unwrap()["title"], "Dune");
    }

    #[test]
    fn malformed_dump_is_rejected() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("bad.json");
        std::fs::write(&file, "[1, 2, 3]").unwrap();
        let target = Target::new(Some(dir.path().to_path_buf()), None);
        assert!(run(&target, &file).is_err());
    }
}
