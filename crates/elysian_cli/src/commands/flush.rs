//! Flush command implementation.

use super::Target;
use tracing::info;

/// Runs the flush command.
///
/// Opening the engine replays pending recovery logs; shutting it down
/// writes fresh snapshots.
pub fn run(target: &Target) -> Result<(), Box<dyn std::error::Error>> {
    let engine = target.open()?;
    let documents = engine.store().count_json_keys();
    engine.shutdown()?;
    info!(documents, "snapshots written");
    println!("Flushed {documents} documents");
    Ok(())
}
