// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory cluster API for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ApiError, ResourceApi, WatchStream};
use async_trait::async_trait;
use relay_core::{apply_merge_patch, LabelSelector, ObjectKey, Resource, WatchEvent};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// API verb, used for call recording and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiVerb {
    List,
    Watch,
    Get,
    Create,
    Update,
    Patch,
    Delete,
}

/// Recorded API call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    pub verb: ApiVerb,
    pub key: Option<ObjectKey>,
    /// Merge patch body, for `Patch` calls
    pub patch: Option<Value>,
}

type CreateHook<K> = Arc<dyn Fn(&mut K) + Send + Sync>;

struct Watcher<K> {
    namespace: Option<String>,
    tx: mpsc::UnboundedSender<WatchEvent<K>>,
}

struct State<K> {
    objects: BTreeMap<ObjectKey, K>,
    version: u64,
    next_uid: u64,
    watchers: Vec<Watcher<K>>,
    failures: HashMap<ApiVerb, VecDeque<ApiError>>,
    calls: Vec<ApiCall>,
    on_create: Option<CreateHook<K>>,
}

impl<K: Resource> State<K> {
    fn record(&mut self, verb: ApiVerb, key: Option<ObjectKey>, patch: Option<Value>) {
        self.calls.push(ApiCall { verb, key, patch });
    }

    fn injected(&mut self, verb: ApiVerb) -> Result<(), ApiError> {
        match self.failures.get_mut(&verb).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn bump(&mut self, object: &mut K) {
        self.version += 1;
        object.metadata_mut().resource_version = Some(self.version.to_string());
    }

    fn notify(&mut self, event: WatchEvent<K>) {
        let namespace = event.object().namespace().to_string();
        self.watchers.retain(|w| {
            if w.namespace.as_deref().is_some_and(|ns| ns != namespace) {
                return !w.tx.is_closed();
            }
            w.tx.send(event.clone()).is_ok()
        });
    }
}

/// Fake cluster API holding objects of one kind in memory
///
/// Assigns uids and resource versions, applies merge patches the way the
/// server does, and fans changes out to every open watch.
pub struct FakeResourceApi<K> {
    state: Arc<Mutex<State<K>>>,
}

impl<K> Clone for FakeResourceApi<K> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<K: Resource> Default for FakeResourceApi<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Resource> FakeResourceApi<K> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                objects: BTreeMap::new(),
                version: 0,
                next_uid: 1,
                watchers: Vec::new(),
                failures: HashMap::new(),
                calls: Vec::new(),
                on_create: None,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State<K>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `hook` on every object before it is stored by `create`
    pub fn with_create_hook(self, hook: impl Fn(&mut K) + Send + Sync + 'static) -> Self {
        self.lock().on_create = Some(Arc::new(hook));
        self
    }

    /// Fail the next call of `verb` with `err`
    pub fn fail_next(&self, verb: ApiVerb, err: ApiError) {
        self.lock().failures.entry(verb).or_default().push_back(err);
    }

    /// Store an object directly, without recording a call
    pub fn seed(&self, mut object: K) -> K {
        let mut state = self.lock();
        state.bump(&mut object);
        state.objects.insert(object.key(), object.clone());
        state.notify(WatchEvent::Added(object.clone()));
        object
    }

    /// Mutate a stored object in place, as another writer would
    pub fn modify(&self, namespace: &str, name: &str, f: impl FnOnce(&mut K)) -> Option<K> {
        let mut state = self.lock();
        let key = ObjectKey::new(namespace, name);
        let mut object = state.objects.get(&key)?.clone();
        f(&mut object);
        state.bump(&mut object);
        state.objects.insert(key, object.clone());
        state.notify(WatchEvent::Modified(object.clone()));
        Some(object)
    }

    /// Current stored copy of an object
    pub fn stored(&self, namespace: &str, name: &str) -> Option<K> {
        self.lock()
            .objects
            .get(&ObjectKey::new(namespace, name))
            .cloned()
    }

    /// All stored objects, ordered by key
    pub fn objects(&self) -> Vec<K> {
        self.lock().objects.values().cloned().collect()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    /// Recorded calls of one verb
    pub fn calls_of(&self, verb: ApiVerb) -> Vec<ApiCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.verb == verb)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl<K: Resource> ResourceApi<K> for FakeResourceApi<K> {
    async fn list(
        &self,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<K>, ApiError> {
        let mut state = self.lock();
        state.record(ApiVerb::List, None, None);
        state.injected(ApiVerb::List)?;
        Ok(state
            .objects
            .values()
            .filter(|o| namespace.map_or(true, |ns| o.namespace() == ns))
            .filter(|o| selector.matches(&o.metadata().labels))
            .cloned()
            .collect())
    }

    async fn watch(&self, namespace: Option<&str>) -> Result<WatchStream<K>, ApiError> {
        let mut state = self.lock();
        state.record(ApiVerb::Watch, None, None);
        state.injected(ApiVerb::Watch)?;
        let (tx, rx) = mpsc::unbounded_channel();
        state.watchers.push(Watcher {
            namespace: namespace.map(str::to_string),
            tx,
        });
        Ok(rx)
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<K, ApiError> {
        let key = ObjectKey::new(namespace, name);
        let mut state = self.lock();
        state.record(ApiVerb::Get, Some(key.clone()), None);
        state.injected(ApiVerb::Get)?;
        state
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| ApiError::not_found::<K>(key))
    }

    async fn create(&self, object: &K) -> Result<K, ApiError> {
        let key = object.key();
        let mut state = self.lock();
        state.record(ApiVerb::Create, Some(key.clone()), None);
        state.injected(ApiVerb::Create)?;

        if key.name.is_empty() {
            return Err(ApiError::Invalid {
                kind: K::KIND,
                message: "metadata.name is required".to_string(),
            });
        }
        if state.objects.contains_key(&key) {
            return Err(ApiError::AlreadyExists { kind: K::KIND, key });
        }

        let mut created = object.clone();
        if created.metadata().uid.is_none() {
            let uid = format!("uid-{}", state.next_uid);
            state.next_uid += 1;
            created.metadata_mut().uid = Some(uid);
        }
        if let Some(hook) = state.on_create.clone() {
            hook(&mut created);
        }
        state.bump(&mut created);
        state.objects.insert(key, created.clone());
        state.notify(WatchEvent::Added(created.clone()));
        Ok(created)
    }

    async fn update(&self, object: &K) -> Result<K, ApiError> {
        let key = object.key();
        let mut state = self.lock();
        state.record(ApiVerb::Update, Some(key.clone()), None);
        state.injected(ApiVerb::Update)?;

        let Some(current) = state.objects.get(&key) else {
            return Err(ApiError::not_found::<K>(key));
        };
        let expected = object.metadata().resource_version.as_deref();
        if expected.is_some() && expected != current.metadata().resource_version.as_deref() {
            return Err(ApiError::Conflict {
                kind: K::KIND,
                key,
                message: "resource version is stale".to_string(),
            });
        }

        let mut updated = object.clone();
        updated.metadata_mut().uid = current.metadata().uid.clone();
        state.bump(&mut updated);
        state.objects.insert(key, updated.clone());
        state.notify(WatchEvent::Modified(updated.clone()));
        Ok(updated)
    }

    async fn patch(&self, namespace: &str, name: &str, patch: &Value) -> Result<K, ApiError> {
        let key = ObjectKey::new(namespace, name);
        let mut state = self.lock();
        state.record(ApiVerb::Patch, Some(key.clone()), Some(patch.clone()));
        state.injected(ApiVerb::Patch)?;

        let Some(current) = state.objects.get(&key).cloned() else {
            return Err(ApiError::not_found::<K>(key));
        };
        let invalid = |e: serde_json::Error| ApiError::Invalid {
            kind: K::KIND,
            message: e.to_string(),
        };

        let mut doc = serde_json::to_value(&current).map_err(invalid)?;
        apply_merge_patch(&mut doc, patch);
        let mut patched: K = serde_json::from_value(doc).map_err(invalid)?;

        // Identity is immutable
        let meta = patched.metadata_mut();
        meta.name = current.metadata().name.clone();
        meta.namespace = current.metadata().namespace.clone();
        meta.uid = current.metadata().uid.clone();

        state.bump(&mut patched);
        state.objects.insert(key, patched.clone());
        state.notify(WatchEvent::Modified(patched.clone()));
        Ok(patched)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ApiError> {
        let key = ObjectKey::new(namespace, name);
        let mut state = self.lock();
        state.record(ApiVerb::Delete, Some(key.clone()), None);
        state.injected(ApiVerb::Delete)?;

        match state.objects.remove(&key) {
            Some(object) => {
                state.notify(WatchEvent::Deleted(object));
                Ok(())
            }
            None => Err(ApiError::not_found::<K>(key)),
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
