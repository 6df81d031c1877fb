// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rendering of a PipelineJob into the batch workload that runs it

use crate::config::RunnerConfig;
use relay_core::{labels, ObjectMeta, PipelineJob, Resource, Workload, WorkloadSpec};

/// Builds the workload manifest for a job
pub trait WorkloadTemplate: Send + Sync + 'static {
    fn render(&self, job: &PipelineJob, service_account: Option<&str>) -> Workload;
}

/// Single-container workload running the job's command or script
///
/// The container sees the job's resolved environment plus `RELAY_*`
/// variables describing the pipeline and its storage endpoint; the
/// `RELAY_*` names are reserved and override job entries.
#[derive(Debug, Clone)]
pub struct DefaultWorkloadTemplate {
    shell: String,
    backoff_limit: u32,
}

impl DefaultWorkloadTemplate {
    pub fn new(config: &RunnerConfig) -> Self {
        Self {
            shell: config.shell.clone(),
            backoff_limit: config.backoff_limit,
        }
    }
}

impl Default for DefaultWorkloadTemplate {
    fn default() -> Self {
        Self::new(&RunnerConfig::default())
    }
}

impl WorkloadTemplate for DefaultWorkloadTemplate {
    fn render(&self, job: &PipelineJob, service_account: Option<&str>) -> Workload {
        let spec = &job.spec;
        let resolved = &spec.job;
        let s3 = &spec.workspace.storage.s3;

        let mut env = resolved.environment.clone();
        let reserved = [
            ("RELAY_PIPELINE", spec.pipeline.clone()),
            ("RELAY_STAGE", spec.stage.clone()),
            ("RELAY_JOB", resolved.name.clone()),
            ("RELAY_WORKSPACE", spec.workspace.path.clone()),
            ("RELAY_S3_HOST", s3.host.clone()),
            ("RELAY_S3_PORT", s3.port.to_string()),
            ("RELAY_S3_USE_SSL", s3.use_ssl.to_string()),
            ("RELAY_S3_BUCKET", s3.bucket_name.clone()),
            ("RELAY_S3_CREDENTIALS_SECRET", s3.credentials.secret.name.clone()),
        ];
        env.extend(reserved.into_iter().map(|(k, v)| (k.to_string(), v)));
        if !resolved.artifacts.is_empty() {
            match serde_json::to_string(&resolved.artifacts) {
                Ok(artifacts) => {
                    env.insert("RELAY_ARTIFACTS".to_string(), artifacts);
                }
                Err(e) => {
                    tracing::warn!(job = %resolved.name, error = %e, "artifacts not encoded");
                }
            }
        }

        let (command, args) = match &resolved.script {
            Some(script) if !script.trim().is_empty() => (
                vec![self.shell.clone(), "-c".to_string()],
                vec![script.clone()],
            ),
            _ => (resolved.command.clone(), resolved.args.clone()),
        };

        // Jobs created by a stage carry the stage object's name
        let stage = job.metadata.label(labels::STAGE).unwrap_or(&spec.stage);
        Workload {
            metadata: ObjectMeta::new(job.namespace(), job.name())
                .with_label(labels::PIPELINE, &spec.pipeline)
                .with_label(labels::STAGE, stage)
                .with_label(labels::JOB, &resolved.name)
                .with_owner(job.controller_reference()),
            spec: WorkloadSpec {
                image: resolved.image.clone(),
                command,
                args,
                env,
                service_account: service_account.map(str::to_string),
                backoff_limit: self.backoff_limit,
            },
            ..Workload::default()
        }
    }
}

#[cfg(test)]
#[path = "workload_template_tests.rs"]
mod tests;
