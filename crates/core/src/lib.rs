// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! relay-core: object model for the relay pipeline controllers
//!
//! This crate provides:
//! - Cluster object kinds (pipelines, stages, jobs, workloads, RBAC)
//! - Pure status transitions for the pipeline, stage and job phases
//! - `KEY=VALUE` environment and artifact parsing
//! - JSON merge-patch diffing used for status updates

pub mod clock;
pub mod id;
pub mod meta;

pub mod artifact;
pub mod env;
pub mod patch;
pub mod phase;
pub mod watch;

// Resource kinds (order matters for dependencies)
pub mod pipeline;
pub mod job;
pub mod stage;
pub mod rbac;
pub mod workload;

pub use clock::{Clock, FakeClock, SystemClock};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use meta::{labels, LabelSelector, ObjectKey, ObjectMeta, OwnerReference, Resource};

pub use artifact::{Artifact, ArtifactError, ArtifactEvent};
pub use env::{parse_env_entry, resolve_environment, EnvError, EnvVar};
pub use patch::{apply_merge_patch, is_empty_patch, merge_diff};
pub use phase::{JobPhase, PipelinePhase, StagePhase};
pub use watch::WatchEvent;

pub use job::{JobStatus, PipelineJob, PipelineJobSpec, ResolvedJob};
pub use pipeline::{
    CredentialsSecretRef, JobRecord, JobSpec, JobTemplate, Pipeline, PipelineSpec,
    PipelineStatus, RepoConfig, S3Config, S3Credentials, SecretKeySelector, SshConfig,
    StageRecord, StorageConfig, Workspace,
};
pub use rbac::{PolicyRule, Role, RoleBinding, ServiceAccount, Subject};
pub use stage::{PipelineStage, StageSpec, StageStatus};
pub use workload::{
    Deployment, DeploymentSpec, DeploymentStatus, Secret, Service, ServiceSpec, Workload,
    WorkloadOutcome, WorkloadSpec, WorkloadStatus,
};
