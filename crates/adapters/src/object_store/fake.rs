// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory object store for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ObjectStore, ObjectStoreError, S3Endpoint};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Recorded object-store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Upload {
        host: String,
        bucket: String,
        object: String,
        path: PathBuf,
    },
    Download {
        host: String,
        bucket: String,
        object: String,
        path: PathBuf,
    },
    Exists {
        host: String,
        bucket: String,
        object: String,
    },
    CreateBucket {
        host: String,
        bucket: String,
    },
}

#[derive(Default)]
struct StoreState {
    buckets: HashMap<String, BTreeMap<String, Vec<u8>>>,
    calls: Vec<StoreCall>,
    unavailable: bool,
}

/// Fake object store keeping bucket contents in memory
#[derive(Clone, Default)]
pub struct FakeObjectStore {
    state: Arc<Mutex<StoreState>>,
}

impl FakeObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the endpoint were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).unavailable = unavailable;
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .calls
            .clone()
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .buckets
            .contains_key(bucket)
    }

    /// Contents of a stored object
    pub fn object(&self, bucket: &str, object: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .buckets
            .get(bucket)
            .and_then(|b| b.get(object))
            .cloned()
    }

    fn record(&self, call: StoreCall) -> Result<(), ObjectStoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let host = match &call {
            StoreCall::Upload { host, .. }
            | StoreCall::Download { host, .. }
            | StoreCall::Exists { host, .. }
            | StoreCall::CreateBucket { host, .. } => host.clone(),
        };
        state.calls.push(call);
        if state.unavailable {
            return Err(ObjectStoreError::Unavailable(host));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn upload_file_to_bucket(
        &self,
        endpoint: &S3Endpoint,
        bucket: &str,
        object: &str,
        path: &Path,
    ) -> Result<(), ObjectStoreError> {
        self.record(StoreCall::Upload {
            host: endpoint.host.clone(),
            bucket: bucket.to_string(),
            object: object.to_string(),
            path: path.to_path_buf(),
        })?;

        let contents = tokio::fs::read(path).await?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let objects = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| ObjectStoreError::NoSuchBucket(bucket.to_string()))?;
        objects.insert(object.to_string(), contents);
        Ok(())
    }

    async fn download_file(
        &self,
        endpoint: &S3Endpoint,
        bucket: &str,
        object: &str,
        path: &Path,
    ) -> Result<(), ObjectStoreError> {
        self.record(StoreCall::Download {
            host: endpoint.host.clone(),
            bucket: bucket.to_string(),
            object: object.to_string(),
            path: path.to_path_buf(),
        })?;

        let contents = {
            let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let objects = state
                .buckets
                .get(bucket)
                .ok_or_else(|| ObjectStoreError::NoSuchBucket(bucket.to_string()))?;
            objects
                .get(object)
                .cloned()
                .ok_or_else(|| ObjectStoreError::NoSuchObject {
                    bucket: bucket.to_string(),
                    object: object.to_string(),
                })?
        };
        tokio::fs::write(path, contents).await?;
        Ok(())
    }

    async fn file_exists(
        &self,
        endpoint: &S3Endpoint,
        bucket: &str,
        object: &str,
    ) -> Result<bool, ObjectStoreError> {
        self.record(StoreCall::Exists {
            host: endpoint.host.clone(),
            bucket: bucket.to_string(),
            object: object.to_string(),
        })?;
        Ok(self.object(bucket, object).is_some())
    }

    async fn create_bucket(
        &self,
        endpoint: &S3Endpoint,
        bucket: &str,
    ) -> Result<(), ObjectStoreError> {
        self.record(StoreCall::CreateBucket {
            host: endpoint.host.clone(),
            bucket: bucket.to_string(),
        })?;
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .buckets
            .entry(bucket.to_string())
            .or_default();
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
