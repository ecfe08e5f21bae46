//! Reset command implementation.

use super::Target;
use elysian_core::Engine;
use tracing::warn;

/// Runs the reset command.
pub fn run(target: &Target) -> Result<(), Box<dyn std::error::Error>> {
    let engine = target.open()?;
    let documents = engine.count_all_entities();
    engine.delete_all()?;
    engine.shutdown()?;
    warn!(documents, "data folder reset");
    println!("Deleted {documents} documents");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reset_empties_the_folder() {
        let dir = tempdir().unwrap();
        let target = Target::new(Some(dir.path().to_path_buf()), None);
        {
            let engine = target.open().unwrap();
            let mut d = serde_json::json!({"n": 1}).as_object().cloned().unwrap();
            engine.write_entity("things", &mut d).unwrap();
            engine.shutdown().unwrap();
        }

        run(&target).unwrap();
        let engine = target.open().unwrap();
        assert_eq!(engine.count_all_entities(), 0);
        assert!(engine.list_entity_types().is_empty());
    }
}
