// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watch-driven caches and the handlers that turn changes into work

use crate::queue::{ActionQueue, SyncAction};
use relay_adapters::{Api, ApiError};
use relay_core::{LabelSelector, ObjectKey, Resource, WatchEvent};
use relay_storage::ObjectCache;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Receives changes after they were applied to the cache
pub trait EventHandler<K>: Send + Sync + 'static {
    fn on_add(&self, object: &K);
    fn on_update(&self, old: &K, new: &K);
    fn on_delete(&self, object: &K);
}

/// Keeps an [`ObjectCache`] in step with the cluster
///
/// Subscribes before listing so no change between the two is lost, marks
/// the cache synced after the first list, and re-lists whenever the watch
/// stream ends.
pub struct Informer<K: Resource> {
    api: Api<K>,
    cache: ObjectCache<K>,
    namespace: Option<String>,
    handlers: Vec<Arc<dyn EventHandler<K>>>,
}

impl<K: Resource> Informer<K> {
    pub fn new(api: Api<K>, cache: ObjectCache<K>) -> Self {
        Self {
            api,
            cache,
            namespace: None,
            handlers: Vec::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn EventHandler<K>>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn cache(&self) -> &ObjectCache<K> {
        &self.cache
    }

    pub async fn run(self, cancel: CancellationToken) {
        let namespace = self.namespace.as_deref();
        loop {
            match self.list_and_watch(namespace, &cancel).await {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(kind = K::KIND, error = %e, "list/watch failed, retrying")
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(RETRY_DELAY) => {}
            }
        }
    }

    /// Returns Ok on cancellation and Err when the stream must be rebuilt
    async fn list_and_watch(
        &self,
        namespace: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        let mut stream = self.api.watch(namespace).await?;
        let objects = self.api.list(namespace, &LabelSelector::everything()).await?;
        tracing::debug!(kind = K::KIND, count = objects.len(), "listed");
        self.relist(objects);
        self.cache.mark_synced();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                event = stream.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => return Err(ApiError::Unavailable(format!("{} watch closed", K::KIND))),
                },
            }
        }
    }

    fn relist(&self, objects: Vec<K>) {
        let fresh: HashSet<ObjectKey> = objects.iter().map(Resource::key).collect();
        let cached = self.cache.list(None);
        for gone in cached.into_iter().filter(|o| !fresh.contains(&o.key())) {
            self.dispatch(WatchEvent::Deleted(gone));
        }
        for object in objects {
            self.dispatch(WatchEvent::Modified(object));
        }
    }

    fn dispatch(&self, event: WatchEvent<K>) {
        tracing::trace!(
            kind = K::KIND,
            key = %event.object().key(),
            event = event.name(),
            "watch event"
        );
        let previous = self.cache.apply(&event);
        for handler in &self.handlers {
            match (&event, &previous) {
                (WatchEvent::Deleted(obj), _) => handler.on_delete(obj),
                (_, Some(old)) => handler.on_update(old, event.object()),
                (_, None) => handler.on_add(event.object()),
            }
        }
    }
}

/// Read-through access: the cache first, the API on a miss
#[derive(Clone)]
pub struct Lister<K: Resource> {
    api: Api<K>,
    cache: ObjectCache<K>,
}

impl<K: Resource> Lister<K> {
    pub fn new(api: Api<K>, cache: ObjectCache<K>) -> Self {
        Self { api, cache }
    }

    /// `None` when the object does not exist
    pub async fn get(&self, key: &ObjectKey) -> Result<Option<K>, ApiError> {
        if let Some(object) = self.cache.get(key) {
            return Ok(Some(object));
        }
        match self.api.get(&key.namespace, &key.name).await {
            Ok(object) => {
                self.cache.insert(object.clone());
                Ok(Some(object))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn list(&self, namespace: Option<&str>, selector: &LabelSelector) -> Vec<K> {
        self.cache.list_selected(namespace, selector)
    }

    pub fn cache(&self) -> &ObjectCache<K> {
        &self.cache
    }
}

/// Enqueues every change of an object under its own key
pub struct EnqueueObject<K> {
    queue: ActionQueue<SyncAction<K>>,
}

impl<K: Resource> EnqueueObject<K> {
    pub fn new(queue: ActionQueue<SyncAction<K>>) -> Self {
        Self { queue }
    }
}

impl<K: Resource> EventHandler<K> for EnqueueObject<K> {
    fn on_add(&self, object: &K) {
        self.queue.add(object.key(), SyncAction::Add(object.clone()));
    }

    fn on_update(&self, _old: &K, new: &K) {
        self.queue.add(new.key(), SyncAction::Update(new.clone()));
    }

    fn on_delete(&self, object: &K) {
        self.queue.add(object.key(), SyncAction::Delete(object.clone()));
    }
}

/// Enqueues the controlling owner of a changed object
pub struct EnqueueOwner<O> {
    queue: ActionQueue<SyncAction<O>>,
    owners: ObjectCache<O>,
}

impl<O: Resource> EnqueueOwner<O> {
    pub fn new(queue: ActionQueue<SyncAction<O>>, owners: ObjectCache<O>) -> Self {
        Self { queue, owners }
    }

    fn enqueue<K: Resource>(&self, object: &K) {
        let Some(owner) = object.metadata().controller_of_kind(O::KIND) else {
            return;
        };
        let key = ObjectKey::new(object.namespace(), owner);
        match self.owners.get(&key) {
            Some(owner) => self.queue.add(key, SyncAction::Update(owner)),
            None => tracing::trace!(kind = O::KIND, %key, "owner not cached"),
        }
    }
}

impl<K: Resource, O: Resource> EventHandler<K> for EnqueueOwner<O> {
    fn on_add(&self, object: &K) {
        self.enqueue(object);
    }

    fn on_update(&self, _old: &K, new: &K) {
        self.enqueue(new);
    }

    fn on_delete(&self, object: &K) {
        self.enqueue(object);
    }
}

#[cfg(test)]
#[path = "informer_tests.rs"]
mod tests;
