//! Dump command implementation.

use super::Target;
use elysian_core::Engine;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Runs the dump command.
pub fn run(target: &Target, output: Option<&Path>, pretty: bool) -> Result<(), Box<dyn std::error::Error>> {
    let engine = target.open()?;
    let dump = engine.dump_all();
    let documents: usize = dump.values().map(Vec::len).sum();

    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    if pretty {
        serde_json::to_writer_pretty(&mut writer, &dump)?;
    } else {
        serde_json::to_writer(&mut writer, &dump)?;
    }
    writeln!(writer)?;
    writer.flush()?;

    info!(entity_types = dump.len(), documents, "dump written");
    engine.shutdown()?;
    Ok(())
}
