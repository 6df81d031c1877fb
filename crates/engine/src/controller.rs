// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generic reconciler framework
//!
//! A [`Controller`] owns a queue, waits for its caches to warm up, then
//! runs a fixed pool of workers (dequeue, reconcile, forget or requeue)
//! next to an optional periodic resync. Cancellation shuts the queue down
//! and `run` returns only after every worker and the resync loop exited.

use crate::error::{ControllerError, ReconcileError};
use crate::queue::{ActionQueue, SyncAction};
use async_trait::async_trait;
use relay_core::Resource;
use relay_storage::ObjectCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

const SYNC_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Handles one dequeued notification
#[async_trait]
pub trait Reconcile<K: Resource>: Send + Sync + 'static {
    async fn reconcile(&self, action: SyncAction<K>) -> Result<(), ReconcileError>;
}

/// Periodic work independent of notifications
#[async_trait]
pub trait Resync: Send + Sync + 'static {
    async fn resync(&self) -> Result<(), ReconcileError>;
}

/// Cache-sync predicate checked before any reconcile runs
pub trait HasSynced: Send + Sync + 'static {
    fn has_synced(&self) -> bool;
}

impl<K: Resource> HasSynced for ObjectCache<K> {
    fn has_synced(&self) -> bool {
        ObjectCache::has_synced(self)
    }
}

pub struct Controller<K: Resource> {
    name: String,
    queue: ActionQueue<SyncAction<K>>,
    handler: Option<Arc<dyn Reconcile<K>>>,
    resync: Option<(Duration, Arc<dyn Resync>)>,
    synced: Vec<Arc<dyn HasSynced>>,
    sync_timeout: Duration,
}

impl<K: Resource> Controller<K> {
    pub fn new(name: impl Into<String>, queue: ActionQueue<SyncAction<K>>) -> Self {
        Self {
            name: name.into(),
            queue,
            handler: None,
            resync: None,
            synced: Vec::new(),
            sync_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn Reconcile<K>>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn with_resync(mut self, period: Duration, resync: Arc<dyn Resync>) -> Self {
        self.resync = Some((period, resync));
        self
    }

    pub fn with_sync_check(mut self, synced: Arc<dyn HasSynced>) -> Self {
        self.synced.push(synced);
        self
    }

    pub fn with_cache_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queue(&self) -> &ActionQueue<SyncAction<K>> {
        &self.queue
    }

    /// Run until `cancel` fires or a reconcile fails fatally
    pub async fn run(
        self,
        cancel: CancellationToken,
        workers: usize,
    ) -> Result<(), ControllerError> {
        if self.handler.is_none() && self.resync.is_none() {
            return Err(ControllerError::NoHandler(self.name));
        }

        tracing::info!(controller = %self.name, "waiting for caches to sync");
        if !self.wait_for_sync(&cancel).await? {
            self.queue.shut_down();
            return Ok(());
        }

        // Child token: a fatal error stops this controller only; the caller
        // decides what else to stop
        let stop = cancel.child_token();
        let mut tasks: JoinSet<Result<(), ReconcileError>> = JoinSet::new();

        if let Some(handler) = &self.handler {
            for worker in 0..workers.max(1) {
                tasks.spawn(process_items(
                    self.name.clone(),
                    worker,
                    self.queue.clone(),
                    Arc::clone(handler),
                    stop.clone(),
                ));
            }
        }
        if let Some((period, resync)) = &self.resync {
            tasks.spawn(resync_loop(
                self.name.clone(),
                *period,
                Arc::clone(resync),
                stop.clone(),
            ));
        }
        tracing::info!(controller = %self.name, workers, "started");

        stop.cancelled().await;
        self.queue.shut_down();

        let mut fatal = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    fatal.get_or_insert(e);
                }
                Err(e) => {
                    tracing::error!(controller = %self.name, error = %e, "worker task failed")
                }
            }
        }
        tracing::info!(controller = %self.name, "stopped");

        match fatal {
            Some(source) => Err(ControllerError::Fatal {
                controller: self.name,
                source,
            }),
            None => Ok(()),
        }
    }

    /// Returns false if cancelled before the caches synced
    async fn wait_for_sync(&self, cancel: &CancellationToken) -> Result<bool, ControllerError> {
        let deadline = Instant::now() + self.sync_timeout;
        loop {
            if self.synced.iter().all(|s| s.has_synced()) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                tracing::error!(
                    controller = %self.name,
                    timeout = ?self.sync_timeout,
                    "cache sync timed out"
                );
                return Err(ControllerError::CacheSyncTimeout {
                    controller: self.name.clone(),
                    timeout: self.sync_timeout,
                });
            }
            tokio::select! {
                _ = cancel.cancelled() => return Ok(false),
                _ = tokio::time::sleep(SYNC_POLL_INTERVAL) => {}
            }
        }
    }
}

async fn process_items<K: Resource>(
    controller: String,
    worker: usize,
    queue: ActionQueue<SyncAction<K>>,
    handler: Arc<dyn Reconcile<K>>,
    stop: CancellationToken,
) -> Result<(), ReconcileError> {
    while let Some((key, action)) = queue.get().await {
        let span = tracing::info_span!(
            "reconcile",
            controller = %controller,
            worker,
            key = %key,
            action = action.name()
        );
        let result = handler.reconcile(action.clone()).instrument(span).await;

        match result {
            Ok(()) => queue.forget(&key),
            Err(e) if e.is_fatal() => {
                tracing::error!(
                    controller = %controller,
                    key = %key,
                    error = %e,
                    "fatal reconcile error, stopping controller"
                );
                queue.done(&key);
                stop.cancel();
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(
                    controller = %controller,
                    key = %key,
                    error = %e,
                    requeues = queue.num_requeues(&key),
                    "reconcile failed, requeueing"
                );
                queue.add_rate_limited(key.clone(), action);
            }
        }
        queue.done(&key);
    }
    Ok(())
}

async fn resync_loop(
    controller: String,
    period: Duration,
    resync: Arc<dyn Resync>,
    stop: CancellationToken,
) -> Result<(), ReconcileError> {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop.cancelled() => return Ok(()),
            _ = ticker.tick() => {}
        }
        let span = tracing::debug_span!("resync", controller = %controller);
        match resync.resync().instrument(span).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => {
                tracing::error!(controller = %controller, error = %e, "fatal resync error");
                stop.cancel();
                return Err(e);
            }
            Err(e) => tracing::warn!(controller = %controller, error = %e, "resync failed"),
        }
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
