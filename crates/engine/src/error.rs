// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the controllers

use crate::patcher::PatchError;
use crate::storage_server::StorageServerError;
use relay_adapters::{ApiError, ObjectStoreError};
use std::time::Duration;
use thiserror::Error;

/// Failure of a single reconcile
///
/// Everything except [`ReconcileError::Fatal`] is retried with backoff.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error(transparent)]
    StorageServer(#[from] StorageServerError),
    #[error("object storage: {0}")]
    ObjectStore(#[from] ObjectStoreError),
    /// A broken internal invariant; the controller stops
    #[error("fatal: {0}")]
    Fatal(String),
}

impl ReconcileError {
    pub fn fatal(message: impl Into<String>) -> Self {
        ReconcileError::Fatal(message.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ReconcileError::Fatal(_))
    }
}

/// Errors that stop a controller
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("controller {0} has neither a handler nor a resync function")]
    NoHandler(String),
    #[error("controller {controller}: caches not synced after {timeout:?}")]
    CacheSyncTimeout {
        controller: String,
        timeout: Duration,
    },
    #[error("controller {controller} stopped: {source}")]
    Fatal {
        controller: String,
        #[source]
        source: ReconcileError,
    },
}
