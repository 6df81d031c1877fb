// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for the cluster object API and the artifact object store

pub mod cluster;
pub mod object_store;
pub mod traced;

pub use cluster::{Api, ApiError, ResourceApi, WatchStream};
pub use object_store::{NoOpObjectStore, ObjectStore, ObjectStoreError, S3Endpoint};
pub use traced::{TracedObjectStore, TracedResourceApi};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use cluster::{ApiCall, ApiVerb, FakeResourceApi};
#[cfg(any(test, feature = "test-support"))]
pub use object_store::{FakeObjectStore, StoreCall};
