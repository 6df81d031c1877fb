// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Semantic validation for pipeline specs and resolved jobs.
//!
//! Validation failures are terminal: the controllers record the message
//! as the object's failure reason and never retry.

use crate::template::resolve_job;
use regex::Regex;
use relay_core::{parse_env_entry, ArtifactError, EnvError, PipelineSpec, ResolvedJob};
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;

// Lowercase DNS label; job names become part of derived object names
#[allow(clippy::expect_used)]
static DNS_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]{0,61}[a-z0-9])?$").expect("constant regex pattern is valid")
});

/// A single validation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("pipeline declares no stages")]
    NoStages,
    #[error("stage name must not be empty")]
    EmptyStageName,
    #[error("stage {0:?} is declared more than once")]
    DuplicateStage(String),
    #[error("stage {0:?} has no jobs")]
    EmptyStage(String),
    #[error("job {0:?} is declared more than once")]
    DuplicateJob(String),
    #[error("invalid job name {0:?}: must be a lowercase DNS label")]
    InvalidJobName(String),
    #[error("job {job:?} references unknown stage {stage:?}")]
    UnknownStage { job: String, stage: String },
    #[error("job {job:?} extends unknown template {template:?}")]
    UnknownTemplate { job: String, template: String },
    #[error("{owner}: {source}")]
    Environment {
        owner: String,
        #[source]
        source: EnvError,
    },
    #[error("{owner}: {source}")]
    Artifact {
        owner: String,
        #[source]
        source: ArtifactError,
    },
    #[error("job {0:?} declares neither commands/args nor a script")]
    MissingCommand(String),
    #[error("job {0:?} declares both commands/args and a script")]
    AmbiguousCommand(String),
    #[error("job {0:?} has no image")]
    MissingImage(String),
}

/// Validate a pipeline spec, reporting the first problem found
pub fn validate_pipeline(spec: &PipelineSpec) -> Result<(), ValidationError> {
    if spec.stages.is_empty() {
        return Err(ValidationError::NoStages);
    }

    let mut stages = HashSet::new();
    for stage in &spec.stages {
        if stage.is_empty() {
            return Err(ValidationError::EmptyStageName);
        }
        if !stages.insert(stage.as_str()) {
            return Err(ValidationError::DuplicateStage(stage.clone()));
        }
    }

    check_environment("pipeline environment", &spec.environment)?;

    for template in &spec.templates {
        let owner = format!("template {:?}", template.name);
        check_environment(&owner, &template.environment)?;
        check_artifacts(&owner, &template.artifacts)?;
    }

    let mut jobs = HashSet::new();
    for job in &spec.jobs {
        if !DNS_LABEL.is_match(&job.name) {
            return Err(ValidationError::InvalidJobName(job.name.clone()));
        }
        if !jobs.insert(job.name.as_str()) {
            return Err(ValidationError::DuplicateJob(job.name.clone()));
        }
        if !stages.contains(job.stage.as_str()) {
            return Err(ValidationError::UnknownStage {
                job: job.name.clone(),
                stage: job.stage.clone(),
            });
        }
        // expand_job skips unknown templates; admission rejects them here
        if let Some(missing) = job.extends.iter().find(|t| spec.template(t).is_none()) {
            return Err(ValidationError::UnknownTemplate {
                job: job.name.clone(),
                template: missing.clone(),
            });
        }

        let owner = format!("job {:?}", job.name);
        check_environment(&owner, &job.environment)?;
        check_artifacts(&owner, &job.artifacts)?;

        match (job.has_command(), job.has_script()) {
            (false, false) => return Err(ValidationError::MissingCommand(job.name.clone())),
            (true, true) => return Err(ValidationError::AmbiguousCommand(job.name.clone())),
            _ => {}
        }

        resolve_job(job, spec)?;
    }

    if let Some(empty) = spec
        .stages
        .iter()
        .find(|stage| spec.jobs_in_stage(stage).next().is_none())
    {
        return Err(ValidationError::EmptyStage(empty.clone()));
    }

    Ok(())
}

/// Validate a job that was already resolved into a stage or job object
pub fn validate_job(job: &ResolvedJob) -> Result<(), ValidationError> {
    if !DNS_LABEL.is_match(&job.name) {
        return Err(ValidationError::InvalidJobName(job.name.clone()));
    }
    if job.image.is_empty() {
        return Err(ValidationError::MissingImage(job.name.clone()));
    }

    let has_command = !job.command.is_empty() || !job.args.is_empty();
    let has_script = job.script.as_deref().is_some_and(|s| !s.trim().is_empty());
    match (has_command, has_script) {
        (false, false) => return Err(ValidationError::MissingCommand(job.name.clone())),
        (true, true) => return Err(ValidationError::AmbiguousCommand(job.name.clone())),
        _ => {}
    }

    check_artifacts(&format!("job {:?}", job.name), &job.artifacts)
}

fn check_environment(owner: &str, entries: &[String]) -> Result<(), ValidationError> {
    for entry in entries {
        parse_env_entry(entry).map_err(|source| ValidationError::Environment {
            owner: owner.to_string(),
            source,
        })?;
    }
    Ok(())
}

fn check_artifacts(owner: &str, artifacts: &[relay_core::Artifact]) -> Result<(), ValidationError> {
    for artifact in artifacts {
        artifact
            .validate()
            .map_err(|source| ValidationError::Artifact {
                owner: owner.to_string(),
                source,
            })?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
