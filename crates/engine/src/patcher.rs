// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal merge-patch status updates
//!
//! The patch sent is the structural difference between the cached
//! snapshot and the locally mutated copy, so fields the local copy never
//! touched are left to whoever else writes them.

use relay_adapters::{Api, ApiError};
use relay_core::{is_empty_patch, merge_diff, Resource};
use relay_storage::ObjectCache;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("failed to serialize {kind}: {source}")]
    Serialize {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl PatchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PatchError::Api(e) if e.is_not_found())
    }
}

/// Submits merge patches and keeps the cache baseline current
#[derive(Clone)]
pub struct StatusPatcher<K: Resource> {
    api: Api<K>,
    cache: ObjectCache<K>,
}

impl<K: Resource> StatusPatcher<K> {
    pub fn new(api: Api<K>, cache: ObjectCache<K>) -> Self {
        Self { api, cache }
    }

    /// Patch `original` into `modified`, returning the server's copy
    ///
    /// An empty difference sends nothing and returns `modified`.
    pub async fn patch(&self, original: &K, modified: &K) -> Result<K, PatchError> {
        let serialize = |object: &K| {
            serde_json::to_value(object).map_err(|source| PatchError::Serialize {
                kind: K::KIND,
                source,
            })
        };
        let diff = merge_diff(&serialize(original)?, &serialize(modified)?);
        if is_empty_patch(&diff) {
            tracing::trace!(kind = K::KIND, key = %original.key(), "no changes to patch");
            return Ok(modified.clone());
        }

        let updated = self
            .api
            .patch(original.namespace(), original.name(), &diff)
            .await?;
        self.cache.insert(updated.clone());
        Ok(updated)
    }
}

#[cfg(test)]
#[path = "patcher_tests.rs"]
mod tests;
