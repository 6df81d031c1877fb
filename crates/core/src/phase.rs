// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle phases for pipelines, stages and jobs

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of a top-level pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelinePhase {
    /// Freshly created, not yet validated
    #[default]
    Empty,
    /// Validated, waiting for admission
    Queued,
    /// Admitted; stages are executing
    Running,
    /// Every stage finished successfully
    Completed,
    /// Validation or a stage failed
    Failed,
}

impl PipelinePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelinePhase::Completed | PipelinePhase::Failed)
    }
}

/// Phase of a pipeline stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StagePhase {
    #[default]
    Empty,
    Running,
    Succeeded,
    Failed,
}

impl StagePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, StagePhase::Succeeded | StagePhase::Failed)
    }
}

/// Phase of a single pipeline job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobPhase {
    #[default]
    Empty,
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobPhase::Succeeded | JobPhase::Failed)
    }
}

macro_rules! display_as_debug {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    fmt::Debug::fmt(self, f)
                }
            }
        )*
    };
}

display_as_debug!(PipelinePhase, StagePhase, JobPhase);
