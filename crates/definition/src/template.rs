// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Template expansion: merging `extends` templates into job declarations

use crate::validate::ValidationError;
use relay_core::{resolve_environment, JobSpec, JobTemplate, PipelineSpec, ResolvedJob};

/// Merge the job's templates, in `extends` order, into a copy of the job
///
/// The resulting environment list is ordered global, then each template,
/// then the job's own entries, so later entries override earlier ones once
/// resolved. A template's non-empty `only_on` replaces the job's gating list
/// and its `allow_failure` flag is adopted. Unknown template names are
/// skipped. Jobs without `extends` are returned unchanged.
pub fn expand_job(
    job: &JobSpec,
    templates: &[JobTemplate],
    global_environment: &[String],
) -> JobSpec {
    if job.extends.is_empty() {
        return job.clone();
    }

    let mut expanded = job.clone();
    let mut environment = global_environment.to_vec();
    let mut artifacts = Vec::new();

    for name in &job.extends {
        let Some(template) = templates.iter().find(|t| &t.name == name) else {
            tracing::debug!(job = %job.name, template = %name, "unknown template skipped");
            continue;
        };

        if expanded.image.is_none() {
            expanded.image = template.image.clone();
        }
        environment.extend(template.environment.iter().cloned());
        artifacts.extend(template.artifacts.iter().cloned());
        if !template.only_on.is_empty() {
            expanded.only_on = template.only_on.clone();
        }
        expanded.allow_failure = template.allow_failure;
    }

    environment.extend(job.environment.iter().cloned());
    artifacts.extend(job.artifacts.iter().cloned());
    expanded.environment = environment;
    expanded.artifacts = artifacts;
    expanded
}

/// Expand a job against its pipeline and flatten it into a `ResolvedJob`
pub fn resolve_job(job: &JobSpec, spec: &PipelineSpec) -> Result<ResolvedJob, ValidationError> {
    let expanded = expand_job(job, &spec.templates, &spec.environment);

    let environment =
        resolve_environment(&expanded.environment).map_err(|source| {
            ValidationError::Environment {
                owner: format!("job {:?}", job.name),
                source,
            }
        })?;

    let image = expanded
        .image
        .filter(|image| !image.is_empty())
        .ok_or_else(|| ValidationError::MissingImage(job.name.clone()))?;

    Ok(ResolvedJob {
        name: expanded.name,
        image,
        environment,
        command: expanded.commands,
        args: expanded.args,
        script: expanded.script,
        allow_failure: expanded.allow_failure,
        artifacts: expanded.artifacts,
        only_on: expanded.only_on,
    })
}

/// Resolve every job of the named stage, in declaration order
pub fn resolve_stage(spec: &PipelineSpec, stage: &str) -> Result<Vec<ResolvedJob>, ValidationError> {
    spec.jobs_in_stage(stage)
        .map(|job| resolve_job(job, spec))
        .collect()
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
