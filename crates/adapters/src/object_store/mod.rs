// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S3-compatible object storage used to hand artifacts between stages

mod noop;

pub use noop::NoOpObjectStore;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeObjectStore, StoreCall};

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors from object-storage operations
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("bucket not found: {0}")]
    NoSuchBucket(String),
    #[error("object not found: {bucket}/{object}")]
    NoSuchObject { bucket: String, object: String },
    #[error("storage endpoint unavailable: {0}")]
    Unavailable(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Connection details for an S3-compatible endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct S3Endpoint {
    pub host: String,
    pub port: u16,
    pub use_ssl: bool,
    pub access_key: String,
    pub secret_key: String,
}

impl S3Endpoint {
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

impl fmt::Debug for S3Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Endpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_ssl", &self.use_ssl)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Object-storage client contract
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Upload a local file as `object` in `bucket`
    async fn upload_file_to_bucket(
        &self,
        endpoint: &S3Endpoint,
        bucket: &str,
        object: &str,
        path: &Path,
    ) -> Result<(), ObjectStoreError>;

    /// Download `object` from `bucket` into a local file
    async fn download_file(
        &self,
        endpoint: &S3Endpoint,
        bucket: &str,
        object: &str,
        path: &Path,
    ) -> Result<(), ObjectStoreError>;

    async fn file_exists(
        &self,
        endpoint: &S3Endpoint,
        bucket: &str,
        object: &str,
    ) -> Result<bool, ObjectStoreError>;

    /// Create a bucket; an existing bucket is success
    async fn create_bucket(&self, endpoint: &S3Endpoint, bucket: &str)
        -> Result<(), ObjectStoreError>;
}

#[async_trait]
impl<S: ObjectStore + ?Sized> ObjectStore for Arc<S> {
    async fn upload_file_to_bucket(
        &self,
        endpoint: &S3Endpoint,
        bucket: &str,
        object: &str,
        path: &Path,
    ) -> Result<(), ObjectStoreError> {
        (**self)
            .upload_file_to_bucket(endpoint, bucket, object, path)
            .await
    }

    async fn download_file(
        &self,
        endpoint: &S3Endpoint,
        bucket: &str,
        object: &str,
        path: &Path,
    ) -> Result<(), ObjectStoreError> {
        (**self).download_file(endpoint, bucket, object, path).await
    }

    async fn file_exists(
        &self,
        endpoint: &S3Endpoint,
        bucket: &str,
        object: &str,
    ) -> Result<bool, ObjectStoreError> {
        (**self).file_exists(endpoint, bucket, object).await
    }

    async fn create_bucket(
        &self,
        endpoint: &S3Endpoint,
        bucket: &str,
    ) -> Result<(), ObjectStoreError> {
        (**self).create_bucket(endpoint, bucket).await
    }
}
