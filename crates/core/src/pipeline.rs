// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline resource: declarative spec plus the status state machine

use crate::artifact::Artifact;
use crate::meta::{resource, ObjectMeta};
use crate::phase::PipelinePhase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level pipeline object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PipelineSpec,
    #[serde(default)]
    pub status: PipelineStatus,
}

resource!(Pipeline, "Pipeline");

impl Pipeline {
    pub fn new(metadata: ObjectMeta, spec: PipelineSpec) -> Self {
        Self {
            metadata,
            spec,
            status: PipelineStatus::default(),
        }
    }
}

/// Declarative pipeline definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSpec {
    #[serde(default)]
    pub workspace: Workspace,
    /// Global `KEY=VALUE` entries inherited by jobs that extend templates
    #[serde(default)]
    pub environment: Vec<String>,
    #[serde(default)]
    pub templates: Vec<JobTemplate>,
    /// Ordered stage names
    #[serde(default)]
    pub stages: Vec<String>,
    #[serde(default)]
    pub jobs: Vec<JobSpec>,
}

impl PipelineSpec {
    /// Jobs declared for the named stage, in declaration order
    pub fn jobs_in_stage<'a>(&'a self, stage: &'a str) -> impl Iterator<Item = &'a JobSpec> + 'a {
        self.jobs.iter().filter(move |job| job.stage == stage)
    }

    pub fn template(&self, name: &str) -> Option<&JobTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }

    /// Stage name for a 1-based stage index
    pub fn stage_at(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.stages.get(i))
            .map(String::as_str)
    }
}

/// Where a pipeline's jobs exchange files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    /// Mount path of the workspace inside job containers
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<RepoConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub s3: S3Config,
}

/// Connection settings for an S3-compatible endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Config {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default, rename = "useSSL")]
    pub use_ssl: bool,
    #[serde(default)]
    pub bucket_name: String,
    #[serde(default)]
    pub credentials: S3Credentials,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct S3Credentials {
    #[serde(default)]
    pub secret: CredentialsSecretRef,
}

/// Secret holding the access and secret keys
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsSecretRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub access_key_key: String,
    #[serde(default)]
    pub secret_key_key: String,
}

/// Source repository cloned into the workspace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoConfig {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh: Option<SshConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SshConfig {
    pub secret: SecretKeySelector,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretKeySelector {
    pub name: String,
    pub key: String,
}

/// A job as declared in the pipeline spec
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub stage: String,
    /// Template names merged into this job, in order
    #[serde(default)]
    pub extends: Vec<String>,
    #[serde(default)]
    pub environment: Vec<String>,
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Runner script, mutually exclusive with `commands`/`args`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default)]
    pub allow_failure: bool,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub only_on: Vec<String>,
}

impl JobSpec {
    pub fn has_command(&self) -> bool {
        !self.commands.is_empty() || !self.args.is_empty()
    }

    pub fn has_script(&self) -> bool {
        self.script.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

/// Reusable job fragment merged into jobs through `extends`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTemplate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub environment: Vec<String>,
    #[serde(default)]
    pub allow_failure: bool,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub only_on: Vec<String>,
}

/// Observed state of a pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatus {
    /// 1-based index of the executing stage; 0 before admission
    #[serde(default)]
    pub stage_index: usize,
    #[serde(default)]
    pub phase: PipelinePhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<StageRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// Execution record of one stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub index: usize,
    #[serde(default)]
    pub jobs: Vec<JobRecord>,
}

/// Execution record of one job within a stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub index: usize,
    /// Names of the resources created for the job
    #[serde(default)]
    pub resource: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

// Transitions keep `0 <= stage_index <= stage_count` and pin terminal
// phases to `stage_index == stage_count`.
impl PipelineStatus {
    /// Empty -> Queued
    pub fn queue(&mut self, now: DateTime<Utc>) {
        self.phase = PipelinePhase::Queued;
        self.stage_index = 0;
        self.failure_reason = None;
        self.last_updated = Some(now);
    }

    /// Queued -> Running at the first stage
    pub fn start(&mut self, stage_count: usize, now: DateTime<Utc>) {
        self.phase = PipelinePhase::Running;
        self.stage_index = stage_count.min(1);
        self.start_time = Some(now);
        self.last_updated = Some(now);
    }

    /// Move past the current stage; completes the pipeline after the last one
    ///
    /// Returns true when the pipeline completed.
    pub fn advance(&mut self, stage_count: usize, now: DateTime<Utc>) -> bool {
        if self.stage_index >= stage_count {
            self.complete(stage_count, now);
            return true;
        }
        self.stage_index += 1;
        self.last_updated = Some(now);
        false
    }

    pub fn complete(&mut self, stage_count: usize, now: DateTime<Utc>) {
        self.phase = PipelinePhase::Completed;
        self.stage_index = stage_count;
        self.end_time = Some(now);
        self.last_updated = Some(now);
    }

    pub fn fail(&mut self, reason: impl Into<String>, stage_count: usize, now: DateTime<Utc>) {
        self.phase = PipelinePhase::Failed;
        self.stage_index = stage_count;
        self.failure_reason = Some(reason.into());
        self.end_time = Some(now);
        self.last_updated = Some(now);
    }

    pub fn stage_record_mut(&mut self, index: usize) -> Option<&mut StageRecord> {
        self.stages.iter_mut().find(|s| s.index == index)
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
