// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PipelineJob resource: one schedulable unit of work

use crate::artifact::Artifact;
use crate::meta::{resource, ObjectMeta};
use crate::phase::JobPhase;
use crate::pipeline::Workspace;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineJob {
    pub metadata: ObjectMeta,
    pub spec: PipelineJobSpec,
    #[serde(default)]
    pub status: JobStatus,
}

resource!(PipelineJob, "PipelineJob");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineJobSpec {
    pub pipeline: String,
    pub stage: String,
    pub workspace: Workspace,
    pub job: ResolvedJob,
}

/// A job after template expansion, ready to become a workload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedJob {
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default)]
    pub allow_failure: bool,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub only_on: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    #[serde(default)]
    pub phase: JobPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl JobStatus {
    pub fn queue(&mut self) {
        self.phase = JobPhase::Queued;
    }

    pub fn start(&mut self, now: DateTime<Utc>) {
        self.phase = JobPhase::Running;
        self.start_time = Some(now);
    }

    pub fn succeed(&mut self, now: DateTime<Utc>) {
        self.phase = JobPhase::Succeeded;
        self.end_time = Some(now);
    }

    pub fn fail(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        self.phase = JobPhase::Failed;
        self.failure_reason = Some(reason.into());
        self.end_time = Some(now);
    }
}
