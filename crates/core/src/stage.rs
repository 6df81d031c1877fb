// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PipelineStage resource: the resolved jobs of one executing stage

use crate::job::ResolvedJob;
use crate::meta::{resource, ObjectMeta};
use crate::phase::StagePhase;
use crate::pipeline::Workspace;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStage {
    pub metadata: ObjectMeta,
    pub spec: StageSpec,
    #[serde(default)]
    pub status: StageStatus,
}

resource!(PipelineStage, "PipelineStage");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    /// Owning pipeline name
    pub pipeline: String,
    /// 1-based position of the stage in the pipeline
    pub index: usize,
    /// Stage name as declared in the pipeline
    pub name: String,
    pub workspace: Workspace,
    #[serde(default)]
    pub jobs: Vec<ResolvedJob>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageStatus {
    #[serde(default)]
    pub phase: StagePhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl StageStatus {
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.phase = StagePhase::Running;
        self.start_time = Some(now);
    }

    pub fn succeed(&mut self, now: DateTime<Utc>) {
        self.phase = StagePhase::Succeeded;
        self.end_time = Some(now);
    }

    pub fn fail(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        self.phase = StagePhase::Failed;
        self.failure_reason = Some(reason.into());
        self.end_time = Some(now);
    }
}
