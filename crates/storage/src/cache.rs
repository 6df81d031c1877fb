// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Object cache materialized from list and watch results
//!
//! Readers always receive owned copies, so a reconcile cycle can mutate
//! what it read without affecting the cached baseline.

use relay_core::{LabelSelector, ObjectKey, Resource, WatchEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

struct Inner<K> {
    objects: RwLock<HashMap<ObjectKey, K>>,
    synced: AtomicBool,
}

/// Shared cache of one resource kind, safe for concurrent reads
pub struct ObjectCache<K> {
    inner: Arc<Inner<K>>,
}

impl<K> Clone for ObjectCache<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Resource> Default for ObjectCache<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Numeric resource versions are comparable; anything else is not
fn is_stale<K: Resource>(incoming: &K, current: &K) -> bool {
    let version = |o: &K| {
        o.metadata()
            .resource_version
            .as_deref()
            .and_then(|v| v.parse::<u64>().ok())
    };
    matches!((version(incoming), version(current)), (Some(a), Some(b)) if a < b)
}

impl<K: Resource> ObjectCache<K> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                objects: RwLock::new(HashMap::new()),
                synced: AtomicBool::new(false),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ObjectKey, K>> {
        self.inner.objects.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ObjectKey, K>> {
        self.inner.objects.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &ObjectKey) -> Option<K> {
        self.read().get(key).cloned()
    }

    /// All cached objects, optionally restricted to a namespace
    pub fn list(&self, namespace: Option<&str>) -> Vec<K> {
        self.list_selected(namespace, &LabelSelector::everything())
    }

    /// Cached objects matching a label selector, ordered by key
    pub fn list_selected(&self, namespace: Option<&str>, selector: &LabelSelector) -> Vec<K> {
        let objects = self.read();
        let mut selected: Vec<K> = objects
            .values()
            .filter(|o| namespace.map_or(true, |ns| o.namespace() == ns))
            .filter(|o| selector.matches(&o.metadata().labels))
            .cloned()
            .collect();
        selected.sort_by_key(|o| o.key());
        selected
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Store an object unless the cache already holds a newer version.
    /// Returns the previously cached copy.
    pub fn insert(&self, object: K) -> Option<K> {
        let mut objects = self.write();
        let key = object.key();
        if let Some(current) = objects.get(&key) {
            if is_stale(&object, current) {
                tracing::trace!(kind = K::KIND, %key, "ignoring stale object");
                return Some(current.clone());
            }
        }
        objects.insert(key, object)
    }

    pub fn remove(&self, key: &ObjectKey) -> Option<K> {
        self.write().remove(key)
    }

    /// Apply a watch event, returning the previously cached copy
    pub fn apply(&self, event: &WatchEvent<K>) -> Option<K> {
        match event {
            WatchEvent::Added(obj) | WatchEvent::Modified(obj) => self.insert(obj.clone()),
            WatchEvent::Deleted(obj) => self.remove(&obj.key()),
        }
    }

    pub fn has_synced(&self) -> bool {
        self.inner.synced.load(Ordering::Acquire)
    }

    pub fn mark_synced(&self) {
        self.inner.synced.store(true, Ordering::Release);
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
