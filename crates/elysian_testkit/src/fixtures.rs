//! Test fixtures and engine helpers.
//!
//! Every engine lives in its own temporary data folder, removed when the
//! fixture is dropped.

use elysian_core::{Config, Document, Engine, EngineOptions, NativeEngine};
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

/// Builds a [`Document`] from a JSON object literal.
///
/// # Panics
///
/// Panics if `value` is not an object.
pub fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Configuration used by test engines: no periodic flush, so snapshots are
/// only written on demand or at shutdown.
pub fn test_config(folder: &Path) -> Config {
    Config::new().folder(folder).flush_interval_seconds(0)
}

/// An engine over a temporary folder.
pub struct TestEngine {
    /// The engine instance.
    pub engine: NativeEngine,
    options: EngineOptions,
    config: Config,
    temp_dir: TempDir,
}

impl TestEngine {
    /// Opens an engine without background tasks; index rebuilds run inline.
    pub fn new() -> Self {
        Self::with_options(EngineOptions::new().background_tasks(false))
    }

    /// Opens an engine with index workers and the other background tasks.
    pub fn with_workers() -> Self {
        Self::with_options(EngineOptions::new())
    }

    /// Opens an engine with the given options.
    pub fn with_options(options: EngineOptions) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let config = test_config(temp_dir.path());
        Self::open_in(temp_dir, config, options)
    }

    /// Opens an engine with a tweaked configuration. The folder is always
    /// replaced by the temporary one.
    pub fn with_config(configure: impl FnOnce(Config) -> Config) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let config = configure(test_config(temp_dir.path())).folder(temp_dir.path());
        Self::open_in(temp_dir, config, EngineOptions::new().background_tasks(false))
    }

    fn open_in(temp_dir: TempDir, config: Config, options: EngineOptions) -> Self {
        let engine = NativeEngine::open_with(config.clone(), options.clone())
            .expect("failed to open engine");
        Self {
            engine,
            options,
            config,
            temp_dir,
        }
    }

    /// The data folder.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Shuts the engine down cleanly and opens it again on the same folder.
    pub fn reopen(self) -> Self {
        let Self {
            engine,
            options,
            config,
            temp_dir,
        } = self;
        engine.shutdown().expect("shutdown failed");
        drop(engine);
        Self::open_in(temp_dir, config, options)
    }

    /// Abandons the engine without shutting it down, as if the process had
    /// died, and opens a new one on the same folder.
    ///
    /// Only the recovery logs and earlier snapshots survive.
    pub fn crash_and_reopen(self) -> Self {
        let Self {
            engine,
            options,
            config,
            temp_dir,
        } = self;
        std::mem::forget(engine);
        Self::open_in(temp_dir, config, options)
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestEngine {
    type Target = NativeEngine;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

/// Runs a test with an engine over a temporary folder.
///
/// # Example
///
/// ```rust,ignore
/// use elysian_testkit::with_temp_engine;
///
/// with_temp_engine(|engine| {
///     assert_eq!(engine.count_all_entities(), 0);
/// });
/// ```
pub fn with_temp_engine<F, R>(f: F) -> R
where
    F: FnOnce(&NativeEngine) -> R,
{
    let test_engine = TestEngine::new();
    f(&test_engine.engine)
}

/// Pre-populated engines.
pub mod scenarios {
    use super::*;
    use serde_json::json;

    /// An engine holding `count` books with ids `book-0..`, a `title`, a
    /// `price` of `count - i` and a `published` date in 2024.
    pub fn bookshop(count: usize) -> TestEngine {
        let test_engine = TestEngine::new();
        for i in 0..count {
            let mut book = doc(json!({
                "id": format!("book-{i}"),
                "title": format!("Title {i}"),
                "price": count - i,
                "published": format!("2024-{:02}-01", i % 12 + 1),
            }));
            let errors = test_engine
                .write_entity("books", &mut book)
                .expect("failed to write book");
            assert!(errors.is_empty());
        }
        test_engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn temp_engine_is_empty() {
        with_temp_engine(|engine| {
            assert_eq!(engine.count_all_entities(), 0);
            assert!(engine.list_entity_types().is_empty());
        });
    }

    #[test]
    fn reopen_keeps_documents() {
        let test_engine = TestEngine::new();
        let mut d = doc(json!({"id": "1", "v": 1}));
        test_engine.write_entity("things", &mut d).unwrap();

        let test_engine = test_engine.reopen();
        assert_eq!(test_engine.read_entity_by_id("things", "1"), Some(d));
    }

    #[test]
    fn bookshop_scenario() {
        let shop = scenarios::bookshop(5);
        assert_eq!(shop.count_entities("books"), 5);
        assert_eq!(shop.read_entity_by_id("books", "book-0").unwrap()["price"], 5);
    }
}
