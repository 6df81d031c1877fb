// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::cluster::{ApiError, ResourceApi, WatchStream};
use crate::object_store::{ObjectStore, ObjectStoreError, S3Endpoint};
use async_trait::async_trait;
use relay_core::{LabelSelector, Resource};
use serde_json::Value;
use std::path::Path;
use std::time::Instant;
use tracing::Instrument;

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Log the outcome of a mutating call; not-found and already-exists are
/// routine for idempotent callers and stay at debug
fn log_result<T>(result: &Result<T, ApiError>, start: Instant) {
    let elapsed_ms = elapsed_ms(start);
    match result {
        Ok(_) => tracing::debug!(elapsed_ms, "ok"),
        Err(e) if e.is_not_found() || e.is_already_exists() => {
            tracing::debug!(elapsed_ms, error = %e, "no change")
        }
        Err(e) => tracing::warn!(elapsed_ms, error = %e, "failed"),
    }
}

/// Wrapper that adds tracing to any ResourceApi
#[derive(Clone)]
pub struct TracedResourceApi<A> {
    inner: A,
}

impl<A> TracedResourceApi<A> {
    pub fn new(inner: A) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<K: Resource, A: ResourceApi<K>> ResourceApi<K> for TracedResourceApi<A> {
    async fn list(
        &self,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<K>, ApiError> {
        let span = tracing::debug_span!("api.list", kind = K::KIND, namespace, %selector);
        async {
            let start = Instant::now();
            let result = self.inner.list(namespace, selector).await;
            match &result {
                Ok(items) => tracing::trace!(
                    count = items.len(),
                    elapsed_ms = elapsed_ms(start),
                    "listed"
                ),
                Err(e) => tracing::warn!(error = %e, "list failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn watch(&self, namespace: Option<&str>) -> Result<WatchStream<K>, ApiError> {
        let span = tracing::info_span!("api.watch", kind = K::KIND, namespace);
        async {
            let result = self.inner.watch(namespace).await;
            match &result {
                Ok(_) => tracing::info!("watch established"),
                Err(e) => tracing::error!(error = %e, "watch failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<K, ApiError> {
        let result = self.inner.get(namespace, name).await;
        tracing::trace!(kind = K::KIND, namespace, name, found = result.is_ok(), "get");
        result
    }

    async fn create(&self, object: &K) -> Result<K, ApiError> {
        let span = tracing::info_span!("api.create", kind = K::KIND, key = %object.key());
        async {
            let start = Instant::now();
            let result = self.inner.create(object).await;
            log_result(&result, start);
            result
        }
        .instrument(span)
        .await
    }

    async fn update(&self, object: &K) -> Result<K, ApiError> {
        let span = tracing::info_span!("api.update", kind = K::KIND, key = %object.key());
        async {
            let start = Instant::now();
            let result = self.inner.update(object).await;
            log_result(&result, start);
            result
        }
        .instrument(span)
        .await
    }

    async fn patch(&self, namespace: &str, name: &str, patch: &Value) -> Result<K, ApiError> {
        let span = tracing::info_span!("api.patch", kind = K::KIND, namespace, name);
        async {
            tracing::debug!(%patch, "patching");
            let start = Instant::now();
            let result = self.inner.patch(namespace, name, patch).await;
            log_result(&result, start);
            result
        }
        .instrument(span)
        .await
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ApiError> {
        let span = tracing::info_span!("api.delete", kind = K::KIND, namespace, name);
        async {
            let start = Instant::now();
            let result = self.inner.delete(namespace, name).await;
            log_result(&result, start);
            result
        }
        .instrument(span)
        .await
    }
}

/// Wrapper that adds tracing to any ObjectStore
#[derive(Clone)]
pub struct TracedObjectStore<S> {
    inner: S,
}

impl<S> TracedObjectStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

fn log_store_result<T>(result: &Result<T, ObjectStoreError>, start: Instant) {
    let elapsed_ms = elapsed_ms(start);
    match result {
        Ok(_) => tracing::info!(elapsed_ms, "ok"),
        Err(e) => tracing::error!(elapsed_ms, error = %e, "failed"),
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for TracedObjectStore<S> {
    async fn upload_file_to_bucket(
        &self,
        endpoint: &S3Endpoint,
        bucket: &str,
        object: &str,
        path: &Path,
    ) -> Result<(), ObjectStoreError> {
        let span = tracing::info_span!(
            "store.upload",
            endpoint = %endpoint.url(),
            bucket,
            object,
            path = %path.display()
        );
        async {
            let start = Instant::now();
            let result = self
                .inner
                .upload_file_to_bucket(endpoint, bucket, object, path)
                .await;
            log_store_result(&result, start);
            result
        }
        .instrument(span)
        .await
    }

    async fn download_file(
        &self,
        endpoint: &S3Endpoint,
        bucket: &str,
        object: &str,
        path: &Path,
    ) -> Result<(), ObjectStoreError> {
        let span = tracing::info_span!(
            "store.download",
            endpoint = %endpoint.url(),
            bucket,
            object,
            path = %path.display()
        );
        async {
            let start = Instant::now();
            let result = self.inner.download_file(endpoint, bucket, object, path).await;
            log_store_result(&result, start);
            result
        }
        .instrument(span)
        .await
    }

    async fn file_exists(
        &self,
        endpoint: &S3Endpoint,
        bucket: &str,
        object: &str,
    ) -> Result<bool, ObjectStoreError> {
        let result = self.inner.file_exists(endpoint, bucket, object).await;
        tracing::trace!(bucket, object, exists = ?result.as_ref().ok(), "checked");
        result
    }

    async fn create_bucket(
        &self,
        endpoint: &S3Endpoint,
        bucket: &str,
    ) -> Result<(), ObjectStoreError> {
        let span = tracing::info_span!("store.create_bucket", endpoint = %endpoint.url(), bucket);
        async {
            let start = Instant::now();
            let result = self.inner.create_bucket(endpoint, bucket).await;
            log_store_result(&result, start);
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
