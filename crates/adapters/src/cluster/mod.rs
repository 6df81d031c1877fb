// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster object API capability
//!
//! One [`ResourceApi`] per resource kind is injected into each controller.
//! Objects are addressed by namespace and name, listed by label selector,
//! and updated through JSON merge patches.

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{ApiCall, ApiVerb, FakeResourceApi};

use async_trait::async_trait;
use relay_core::{LabelSelector, ObjectKey, Resource, WatchEvent};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Stream of change notifications for one resource kind
pub type WatchStream<K> = mpsc::UnboundedReceiver<WatchEvent<K>>;

/// Shared handle to the API for one resource kind
pub type Api<K> = Arc<dyn ResourceApi<K>>;

/// Errors from the cluster object API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: ObjectKey },
    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: &'static str, key: ObjectKey },
    #[error("conflict on {kind} {key}: {message}")]
    Conflict {
        kind: &'static str,
        key: ObjectKey,
        message: String,
    },
    #[error("invalid {kind}: {message}")]
    Invalid { kind: &'static str, message: String },
    #[error("api unavailable: {0}")]
    Unavailable(String),
}

impl ApiError {
    pub fn not_found<K: Resource>(key: ObjectKey) -> Self {
        ApiError::NotFound { kind: K::KIND, key }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, ApiError::AlreadyExists { .. })
    }
}

/// CRUD, patch and watch access to one namespaced resource kind
#[async_trait]
pub trait ResourceApi<K: Resource>: Send + Sync + 'static {
    /// List objects, optionally restricted to a namespace
    async fn list(
        &self,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<K>, ApiError>;

    /// Subscribe to changes made after this call returns
    async fn watch(&self, namespace: Option<&str>) -> Result<WatchStream<K>, ApiError>;

    async fn get(&self, namespace: &str, name: &str) -> Result<K, ApiError>;

    async fn create(&self, object: &K) -> Result<K, ApiError>;

    /// Replace an object; a stale resource version is a conflict
    async fn update(&self, object: &K) -> Result<K, ApiError>;

    /// Apply a JSON merge patch and return the server's copy
    async fn patch(&self, namespace: &str, name: &str, patch: &Value) -> Result<K, ApiError>;

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl<K: Resource, A: ResourceApi<K> + ?Sized> ResourceApi<K> for Arc<A> {
    async fn list(
        &self,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<K>, ApiError> {
        (**self).list(namespace, selector).await
    }

    async fn watch(&self, namespace: Option<&str>) -> Result<WatchStream<K>, ApiError> {
        (**self).watch(namespace).await
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<K, ApiError> {
        (**self).get(namespace, name).await
    }

    async fn create(&self, object: &K) -> Result<K, ApiError> {
        (**self).create(object).await
    }

    async fn update(&self, object: &K) -> Result<K, ApiError> {
        (**self).update(object).await
    }

    async fn patch(&self, namespace: &str, name: &str, patch: &Value) -> Result<K, ApiError> {
        (**self).patch(namespace, name, patch).await
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ApiError> {
        (**self).delete(namespace, name).await
    }
}
