// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op object store for deployments without artifact hand-off

use super::{ObjectStore, ObjectStoreError, S3Endpoint};
use async_trait::async_trait;
use std::path::Path;

/// Object store that accepts every write and holds nothing
#[derive(Clone, Copy, Default)]
pub struct NoOpObjectStore;

impl NoOpObjectStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ObjectStore for NoOpObjectStore {
    async fn upload_file_to_bucket(
        &self,
        _endpoint: &S3Endpoint,
        _bucket: &str,
        _object: &str,
        _path: &Path,
    ) -> Result<(), ObjectStoreError> {
        Ok(())
    }

    async fn download_file(
        &self,
        _endpoint: &S3Endpoint,
        bucket: &str,
        object: &str,
        _path: &Path,
    ) -> Result<(), ObjectStoreError> {
        Err(ObjectStoreError::NoSuchObject {
            bucket: bucket.to_string(),
            object: object.to_string(),
        })
    }

    async fn file_exists(
        &self,
        _endpoint: &S3Endpoint,
        _bucket: &str,
        _object: &str,
    ) -> Result<bool, ObjectStoreError> {
        Ok(false)
    }

    async fn create_bucket(
        &self,
        _endpoint: &S3Endpoint,
        _bucket: &str,
    ) -> Result<(), ObjectStoreError> {
        Ok(())
    }
}
