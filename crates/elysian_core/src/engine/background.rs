//! Background threads: snapshot flusher, expiration sweeper, index workers
//! and cache cleaner.

use super::native::EngineState;
use crate::error::CoreResult;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Wakes periodic loops early on shutdown.
#[derive(Debug, Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

impl StopSignal {
    fn stop(&self) {
        *self.stopped.lock() = true;
        self.condvar.notify_all();
    }

    /// Sleeps for `period` or until stopped. Returns true once stopped.
    fn wait(&self, period: Duration) -> bool {
        let deadline = Instant::now() + period;
        let mut stopped = self.stopped.lock();
        while !*stopped {
            if self.condvar.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }
}

/// Handles of the running background threads.
pub(crate) struct Background {
    stop: Arc<StopSignal>,
    periodic: Vec<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl Background {
    /// Starts every background task for `state`.
    pub(crate) fn spawn(state: &Arc<EngineState>) -> CoreResult<Self> {
        let config = state.config.read().clone();
        let mut background = Self {
            stop: Arc::new(StopSignal::default()),
            periodic: Vec::new(),
            workers: Vec::new(),
        };

        if config.store.flush_interval_seconds > 0 {
            let period = Duration::from_secs(config.store.flush_interval_seconds);
            background.every("elysian-flusher", period, state, |state| {
                if state.store.is_saved() {
                    return;
                }
                match state.snapshot() {
                    Ok(()) => debug!("periodic snapshot written"),
                    Err(e) => error!(error = %e, "periodic snapshot failed"),
                }
            })?;
        }

        background.every("elysian-expiration", SWEEP_INTERVAL, state, |state| {
            state.store.clean_all_past_keys();
        })?;

        if state.cache.is_some() {
            background.every("elysian-cache-cleaner", SWEEP_INTERVAL, state, |state| {
                if let Some(cache) = &state.cache {
                    let removed = cache.clean_expired();
                    if removed > 0 {
                        debug!(removed, "expired cache entries removed");
                    }
                }
            })?;
        }

        state.workers_running.store(true, Ordering::Release);
        for n in 0..config.api.index.workers {
            let worker_state = Arc::clone(state);
            let handle = thread::Builder::new()
                .name(format!("elysian-index-{n}"))
                .spawn(move || {
                    while let Some(entity) = worker_state.dirty.pop() {
                        worker_state.rebuild_entity(&entity);
                        worker_state.dirty.done();
                    }
                });
            match handle {
                Ok(handle) => background.workers.push(handle),
                Err(e) => {
                    background.shutdown(state);
                    return Err(e.into());
                }
            }
        }

        info!(
            workers = config.api.index.workers,
            flush_interval = config.store.flush_interval_seconds,
            cache = state.cache.is_some(),
            "background tasks started"
        );
        Ok(background)
    }

    fn every<F>(
        &mut self,
        name: &str,
        period: Duration,
        state: &Arc<EngineState>,
        tick: F,
    ) -> CoreResult<()>
    where
        F: Fn(&EngineState) + Send + 'static,
    {
        let stop = Arc::clone(&self.stop);
        let state = Arc::clone(state);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while !stop.wait(period) {
                    tick(&state);
                }
            })?;
        self.periodic.push(handle);
        Ok(())
    }

    /// Stops the periodic loops and lets the workers drain the dirty queue
    /// before joining them.
    pub(crate) fn shutdown(self, state: &EngineState) {
        self.stop.stop();
        state.dirty.close();
        for handle in self.periodic.into_iter().chain(self.workers) {
            if handle.join().is_err() {
                error!("background thread panicked");
            }
        }
        state.workers_running.store(false, Ordering::Release);
        info!("background tasks stopped");
    }
}
