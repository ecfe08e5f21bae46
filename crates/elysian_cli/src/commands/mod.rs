//! CLI command implementations.

pub mod dump;
pub mod flush;
pub mod import;
pub mod inspect;
pub mod list;
pub mod reset;

use elysian_core::{Config, EngineOptions, NativeEngine};
use std::path::{Path, PathBuf};

/// The data folder a command works on.
#[derive(Debug, Clone)]
pub struct Target {
    folder: Option<PathBuf>,
    config: Option<PathBuf>,
}

impl Target {
    /// Combines the global `--folder` and `--config` options.
    pub fn new(folder: Option<PathBuf>, config: Option<PathBuf>) -> Self {
        Self { folder, config }
    }

    /// The effective configuration.
    pub fn config(&self) -> Result<Config, Box<dyn std::error::Error>> {
        let config = match &self.config {
            Some(path) => Config::load(path)?,
            None => {
                if self.folder.is_none() {
                    return Err("a data folder is required (--folder or --config)".into());
                }
                Config::new()
            }
        };
        Ok(match &self.folder {
            Some(folder) => config.folder(folder),
            None => config,
        })
    }

    /// The effective data folder.
    pub fn folder(&self) -> Result<PathBuf, Box<dyn std::error::Error>> {
        Ok(self.config()?.store.folder)
    }

    /// Opens the engine without background tasks. Opening replays any
    /// pending recovery log.
    pub fn open(&self) -> Result<NativeEngine, Box<dyn std::error::Error>> {
        let config = self.config()?;
        ensure_exists(&config.store.folder)?;
        let engine =
            NativeEngine::open_with(config, EngineOptions::new().background_tasks(false))?;
        Ok(engine)
    }
}

fn ensure_exists(folder: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if folder.is_dir() {
        Ok(())
    } else {
        Err(format!("no data folder at {}", folder.display()).into())
    }
}
