// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rate-limited, deduplicating work queue keyed by object identity
//!
//! At most one unit of work is outstanding per key: adding a key that is
//! already waiting replaces its payload, and a key that is being processed
//! is parked until the worker calls [`ActionQueue::done`]. A key is never
//! handed to two workers at once.

use relay_core::{ObjectKey, Resource};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Change notification carried through the queue
#[derive(Debug, Clone, PartialEq)]
pub enum SyncAction<K> {
    Add(K),
    Update(K),
    Delete(K),
}

impl<K: Resource> SyncAction<K> {
    pub fn key(&self) -> ObjectKey {
        self.object().key()
    }

    pub fn object(&self) -> &K {
        match self {
            SyncAction::Add(obj) | SyncAction::Update(obj) | SyncAction::Delete(obj) => obj,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SyncAction::Add(_) => "add",
            SyncAction::Update(_) => "update",
            SyncAction::Delete(_) => "delete",
        }
    }
}

/// Exponential per-key backoff: `base * 2^failures`, capped at `max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiter {
    base: Duration,
    max: Duration,
}

impl RateLimiter {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    pub fn delay(&self, failures: u32) -> Duration {
        let factor = 2u32.checked_pow(failures).unwrap_or(u32::MAX);
        self.base.checked_mul(factor).unwrap_or(self.max).min(self.max)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(5), Duration::from_secs(1000))
    }
}

struct QueueState<A> {
    /// Keys ready for a worker, in arrival order
    ready: VecDeque<ObjectKey>,
    /// Latest payload per key waiting to be processed
    pending: HashMap<ObjectKey, A>,
    processing: HashSet<ObjectKey>,
    failures: HashMap<ObjectKey, u32>,
}

struct Inner<A> {
    state: Mutex<QueueState<A>>,
    available: Notify,
    closed: CancellationToken,
    limiter: RateLimiter,
}

/// Shared work queue; clones refer to the same queue
pub struct ActionQueue<A> {
    inner: Arc<Inner<A>>,
}

impl<A> Clone for ActionQueue<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Send + 'static> ActionQueue<A> {
    pub fn new(limiter: RateLimiter) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState {
                    ready: VecDeque::new(),
                    pending: HashMap::new(),
                    processing: HashSet::new(),
                    failures: HashMap::new(),
                }),
                available: Notify::new(),
                closed: CancellationToken::new(),
                limiter,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<A>> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enqueue `action` for `key`, replacing any payload still waiting
    pub fn add(&self, key: ObjectKey, action: A) {
        self.insert(key, action, true);
    }

    fn insert(&self, key: ObjectKey, action: A, replace: bool) {
        if self.is_shutting_down() {
            return;
        }
        let mut state = self.lock();
        if let Some(waiting) = state.pending.get_mut(&key) {
            if replace {
                *waiting = action;
            }
            return;
        }
        state.pending.insert(key.clone(), action);
        if !state.processing.contains(&key) {
            state.ready.push_back(key);
            drop(state);
            self.inner.available.notify_one();
        }
    }

    /// Wait for the next key and its latest payload
    ///
    /// Returns `None` once the queue is shut down.
    pub async fn get(&self) -> Option<(ObjectKey, A)> {
        loop {
            let notified = self.inner.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_shutting_down() {
                return None;
            }
            {
                let mut state = self.lock();
                while let Some(key) = state.ready.pop_front() {
                    let Some(action) = state.pending.remove(&key) else {
                        continue;
                    };
                    state.processing.insert(key.clone());
                    let more = !state.ready.is_empty();
                    drop(state);
                    if more {
                        self.inner.available.notify_one();
                    }
                    return Some((key, action));
                }
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = self.inner.closed.cancelled() => return None,
            }
        }
    }

    /// Mark `key` as processed; a payload added meanwhile becomes ready
    pub fn done(&self, key: &ObjectKey) {
        let mut state = self.lock();
        state.processing.remove(key);
        if state.pending.contains_key(key) {
            state.ready.push_back(key.clone());
            drop(state);
            self.inner.available.notify_one();
        }
    }

    /// Re-add after the key's backoff delay; a newer payload wins
    pub fn add_rate_limited(&self, key: ObjectKey, action: A) {
        let delay = {
            let mut state = self.lock();
            let failures = state.failures.entry(key.clone()).or_insert(0);
            let delay = self.inner.limiter.delay(*failures);
            *failures = failures.saturating_add(1);
            delay
        };

        let queue = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => queue.insert(key, action, false),
                _ = queue.inner.closed.cancelled() => {}
            }
        });
    }

    /// Reset the backoff history of `key`
    pub fn forget(&self, key: &ObjectKey) {
        self.lock().failures.remove(key);
    }

    pub fn num_requeues(&self, key: &ObjectKey) -> u32 {
        self.lock().failures.get(key).copied().unwrap_or(0)
    }

    /// Number of keys ready for a worker
    pub fn len(&self) -> usize {
        self.lock().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting work and release every waiting worker
    pub fn shut_down(&self) {
        self.inner.closed.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.closed.is_cancelled()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
