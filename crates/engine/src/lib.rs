// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! relay-engine: the reconciling controllers
//!
//! Informers keep per-kind caches current and turn changes into queued
//! work; controllers drain the queues through the pipeline, stage, job and
//! workload reconcilers; the manager runs them all.

pub mod config;
mod context;
mod controller;
mod error;
mod informer;
mod job;
mod manager;
mod patcher;
mod pipeline;
mod queue;
mod rbac;
mod stage;
mod storage_server;
pub mod telemetry;
mod workload;
mod workload_template;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod testing;
#[cfg(any(test, feature = "test-support"))]
pub use testing::FakeClients;

pub use config::{ConfigError, ControllerConfig};
pub use context::{job_object_name, stage_object_name, Caches, Clients};
pub use controller::{Controller, HasSynced, Reconcile, Resync};
pub use error::{ControllerError, ReconcileError};
pub use informer::{EnqueueObject, EnqueueOwner, EventHandler, Informer, Lister};
pub use job::JobReconciler;
pub use manager::ControllerManager;
pub use patcher::{PatchError, StatusPatcher};
pub use pipeline::{bucket_name, PipelineReconciler, PipelineResync};
pub use queue::{ActionQueue, RateLimiter, SyncAction};
pub use rbac::{runner_name, RbacApis, RunnerAccess};
pub use stage::StageReconciler;
pub use storage_server::{StorageApis, StorageServer, StorageServerError};
pub use telemetry::init_logging;
pub use workload::WorkloadReconciler;
pub use workload_template::{DefaultWorkloadTemplate, WorkloadTemplate};
