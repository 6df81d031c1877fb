// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact declarations handed between stages through object storage

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// When an artifact is uploaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactEvent {
    #[serde(rename = "on-success")]
    OnSuccess,
    #[serde(rename = "on-failure")]
    OnFailure,
}

impl FromStr for ArtifactEvent {
    type Err = ArtifactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on-success" => Ok(ArtifactEvent::OnSuccess),
            "on-failure" => Ok(ArtifactEvent::OnFailure),
            other => Err(ArtifactError::UnknownEvent(other.to_string())),
        }
    }
}

impl fmt::Display for ArtifactEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactEvent::OnSuccess => write!(f, "on-success"),
            ArtifactEvent::OnFailure => write!(f, "on-failure"),
        }
    }
}

/// Problems with an artifact declaration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtifactError {
    #[error("artifact name must not be empty")]
    EmptyName,
    #[error("artifact {0:?} declares no paths")]
    NoPaths(String),
    #[error("unknown artifact event {0:?} (expected on-success or on-failure)")]
    UnknownEvent(String),
}

/// A named set of paths uploaded after a job finishes
///
/// The event is kept as the raw string so that an unrecognized value
/// surfaces as a validation failure rather than a decode error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub paths: Vec<String>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, event: ArtifactEvent, paths: &[&str]) -> Self {
        Self {
            name: name.into(),
            event: event.to_string(),
            paths: paths.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn event(&self) -> Result<ArtifactEvent, ArtifactError> {
        self.event.parse()
    }

    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.name.is_empty() {
            return Err(ArtifactError::EmptyName);
        }
        if self.paths.is_empty() {
            return Err(ArtifactError::NoPaths(self.name.clone()));
        }
        self.event().map(|_| ())
    }
}
