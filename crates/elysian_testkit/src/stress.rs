//! Concurrent load helpers.
//!
//! These drive an [`Engine`] from several threads at once and report what
//! happened, so tests can check the invariants that must hold afterwards.

use crate::fixtures::doc;
use elysian_core::{Engine, ListQuery};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
}

impl StressTestResult {
    /// Operations per second.
    pub fn ops_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            (self.successful_ops + self.failed_ops) as f64 / secs
        } else {
            0.0
        }
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent threads.
    pub threads: usize,
    /// Documents written per thread.
    pub writes_per_thread: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            writes_per_thread: 250,
        }
    }
}

/// Writes `threads * writes_per_thread` documents into `entity` from
/// several threads, with ids `t<thread>-<n>` and a numeric `rank`.
pub fn stress_concurrent_writes<E>(engine: &E, entity: &str, config: &StressConfig) -> StressTestResult
where
    E: Engine,
{
    let ok = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let start = Instant::now();

    thread::scope(|scope| {
        for t in 0..config.threads {
            let (ok, failed) = (&ok, &failed);
            scope.spawn(move || {
                for n in 0..config.writes_per_thread {
                    let mut d = doc(json!({
                        "id": format!("t{t}-{n}"),
                        "rank": (n * config.threads + t) as u64,
                    }));
                    match engine.write_entity(entity, &mut d) {
                        Ok(errors) if errors.is_empty() => ok.fetch_add(1, Ordering::Relaxed),
                        _ => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            });
        }
    });

    StressTestResult {
        successful_ops: ok.into_inner(),
        failed_ops: failed.into_inner(),
        duration: start.elapsed(),
    }
}

/// Lists `entity` sorted by `rank` from several threads while nothing else
/// runs. Returns how many listings came back with `expected` documents.
pub fn stress_concurrent_lists<E>(engine: &E, entity: &str, expected: usize, threads: usize) -> usize
where
    E: Engine,
{
    let complete = AtomicUsize::new(0);
    thread::scope(|scope| {
        for _ in 0..threads {
            let complete = &complete;
            scope.spawn(move || {
                let query = ListQuery::new(entity).sort("rank", true);
                if let Ok(docs) = engine.list_entities(&query) {
                    if docs.len() == expected {
                        complete.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });
    complete.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestEngine;

    #[test]
    fn concurrent_writes_are_all_listed() {
        let test_engine = TestEngine::new();
        let config = StressConfig {
            threads: 4,
            writes_per_thread: 25,
        };
        let result = stress_concurrent_writes(&test_engine.engine, "load", &config);
        assert_eq!(result.successful_ops, 100);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(test_engine.count_entities("load"), 100);
        assert_eq!(stress_concurrent_lists(&test_engine.engine, "load", 100, 4), 4);
    }
}
