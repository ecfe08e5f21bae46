//! Bounded queue of entities whose sort indexes need rebuilding.
//!
//! An entity is queued at most once: pushing an entity that is already
//! waiting coalesces. An entity that is being rebuilt can be queued again,
//! so a write that lands during a rebuild still triggers a fresh one.

use parking_lot::{Condvar, Mutex};
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

/// Outcome of [`DirtyQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The entity was appended.
    Queued,
    /// The entity was already waiting.
    Coalesced,
    /// The queue is at capacity; the caller must rebuild inline.
    Full,
    /// The queue no longer accepts work.
    Closed,
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<String>,
    pending: HashSet<String>,
    in_flight: usize,
    closed: bool,
}

impl QueueState {
    fn is_idle(&self) -> bool {
        self.items.is_empty() && self.in_flight == 0
    }
}

/// Dirty-entity queue shared by writers and index workers.
#[derive(Debug)]
pub struct DirtyQueue {
    capacity: usize,
    state: Mutex<QueueState>,
    available: Condvar,
    idle: Condvar,
}

impl DirtyQueue {
    /// Creates a queue holding at most `capacity` distinct entities.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
            idle: Condvar::new(),
        }
    }

    /// Marks `entity` dirty.
    pub fn push(&self, entity: &str) -> PushOutcome {
        let mut state = self.state.lock();
        if state.closed {
            return PushOutcome::Closed;
        }
        if state.pending.contains(entity) {
            return PushOutcome::Coalesced;
        }
        if state.items.len() >= self.capacity {
            return PushOutcome::Full;
        }
        state.pending.insert(entity.to_string());
        state.items.push_back(entity.to_string());
        drop(state);
        self.available.notify_one();
        PushOutcome::Queued
    }

    fn take(&self, state: &mut QueueState) -> Option<String> {
        let entity = state.items.pop_front()?;
        state.pending.remove(&entity);
        state.in_flight += 1;
        Some(entity)
    }

    /// Blocks until an entity is available. Returns `None` once the queue
    /// is closed and empty.
    ///
    /// Every entity returned must be acknowledged with [`DirtyQueue::done`].
    pub fn pop(&self) -> Option<String> {
        let mut state = self.state.lock();
        loop {
            if let Some(entity) = self.take(&mut state) {
                return Some(entity);
            }
            if state.closed {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    /// Pops without blocking.
    pub fn try_pop(&self) -> Option<String> {
        let mut state = self.state.lock();
        self.take(&mut state)
    }

    /// Acknowledges an entity returned by a pop.
    pub fn done(&self) {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        if state.is_idle() {
            self.idle.notify_all();
        }
    }

    /// Waits until nothing is queued or being rebuilt. Returns false on
    /// timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.is_idle() {
            if self.idle.wait_until(&mut state, deadline).timed_out() {
                return state.is_idle();
            }
        }
        true
    }

    /// Stops accepting work and wakes every blocked pop. Queued entities can
    /// still be popped.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    /// Returns true once [`DirtyQueue::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of waiting entities.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Returns true if no entity is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if nothing is waiting or being rebuilt.
    pub fn is_idle(&self) -> bool {
        self.state.lock().is_idle()
    }
}
