// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PipelineStage phase machine: spawn one PipelineJob per resolved job,
//! then aggregate their phases into the stage's.

use crate::context::{job_object_name, Caches, Clients};
use crate::controller::Reconcile;
use crate::error::ReconcileError;
use crate::informer::Lister;
use crate::patcher::StatusPatcher;
use crate::queue::SyncAction;
use async_trait::async_trait;
use relay_core::{
    labels, Clock, JobPhase, LabelSelector, ObjectMeta, PipelineJob, PipelineJobSpec,
    PipelineStage, Resource, StagePhase,
};
use relay_definition::validate_job;
use relay_storage::ObjectCache;
use std::sync::Arc;

pub struct StageReconciler<C: Clock> {
    clients: Clients,
    stages: Lister<PipelineStage>,
    jobs: ObjectCache<PipelineJob>,
    patcher: StatusPatcher<PipelineStage>,
    clock: C,
}

impl<C: Clock> StageReconciler<C> {
    pub fn new(clients: Clients, caches: &Caches, clock: C) -> Self {
        Self {
            stages: Lister::new(Arc::clone(&clients.stages), caches.stages.clone()),
            jobs: caches.jobs.clone(),
            patcher: StatusPatcher::new(Arc::clone(&clients.stages), caches.stages.clone()),
            clients,
            clock,
        }
    }

    async fn patch(
        &self,
        original: &PipelineStage,
        modified: &PipelineStage,
    ) -> Result<(), ReconcileError> {
        match self.patcher.patch(original, modified).await {
            Err(e) if !e.is_not_found() => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn fail(&self, stage: &PipelineStage, reason: String) -> Result<(), ReconcileError> {
        tracing::warn!(reason = %reason, "stage failed");
        let mut modified = stage.clone();
        modified.status.fail(reason, self.clock.now());
        self.patch(stage, &modified).await
    }

    async fn start(&self, stage: &PipelineStage) -> Result<(), ReconcileError> {
        if stage.spec.jobs.is_empty() {
            return self
                .fail(stage, format!("stage {:?} has no jobs", stage.spec.name))
                .await;
        }
        for job in &stage.spec.jobs {
            if let Err(e) = validate_job(job) {
                return self.fail(stage, e.to_string()).await;
            }
        }

        for resolved in &stage.spec.jobs {
            let job = PipelineJob {
                metadata: ObjectMeta::new(
                    stage.namespace(),
                    job_object_name(stage.name(), &resolved.name),
                )
                .with_label(labels::PIPELINE, &stage.spec.pipeline)
                .with_label(labels::STAGE, stage.name())
                .with_label(labels::JOB, &resolved.name)
                .with_owner(stage.controller_reference()),
                spec: PipelineJobSpec {
                    pipeline: stage.spec.pipeline.clone(),
                    stage: stage.spec.name.clone(),
                    workspace: stage.spec.workspace.clone(),
                    job: resolved.clone(),
                },
                ..PipelineJob::default()
            };
            match self.clients.jobs.create(&job).await {
                Ok(_) => tracing::debug!(job = %job.name(), "job created"),
                Err(e) if e.is_already_exists() => {}
                Err(e) => return Err(e.into()),
            }
        }

        let mut modified = stage.clone();
        modified.status.start(self.clock.now());
        self.patch(stage, &modified).await?;
        tracing::info!(jobs = stage.spec.jobs.len(), "stage started");
        Ok(())
    }

    /// Succeeded once every job is done; Failed on the first disallowed failure
    async fn aggregate(&self, stage: &PipelineStage) -> Result<(), ReconcileError> {
        let selector = LabelSelector::everything()
            .with(labels::PIPELINE, &stage.spec.pipeline)
            .with(labels::STAGE, stage.name());
        let observed = self.jobs.list_selected(Some(stage.namespace()), &selector);

        let mut finished = 0;
        for resolved in &stage.spec.jobs {
            let name = job_object_name(stage.name(), &resolved.name);
            let Some(job) = observed.iter().find(|j| j.name() == name) else {
                continue;
            };
            match job.status.phase {
                JobPhase::Failed if !resolved.allow_failure => {
                    let reason = format!(
                        "job {} failed: {}",
                        resolved.name,
                        job.status.failure_reason.as_deref().unwrap_or("unknown")
                    );
                    return self.fail(stage, reason).await;
                }
                JobPhase::Failed => {
                    tracing::debug!(job = %resolved.name, "allowed failure");
                    finished += 1;
                }
                JobPhase::Succeeded => finished += 1,
                JobPhase::Empty | JobPhase::Queued | JobPhase::Running => {}
            }
        }

        if finished < stage.spec.jobs.len() {
            tracing::trace!(finished, total = stage.spec.jobs.len(), "stage in progress");
            return Ok(());
        }
        let mut modified = stage.clone();
        modified.status.succeed(self.clock.now());
        self.patch(stage, &modified).await?;
        tracing::info!("stage succeeded");
        Ok(())
    }
}

#[async_trait]
impl<C: Clock> Reconcile<PipelineStage> for StageReconciler<C> {
    async fn reconcile(&self, action: SyncAction<PipelineStage>) -> Result<(), ReconcileError> {
        // Jobs are owned by the stage and go with it
        if let SyncAction::Delete(_) = action {
            return Ok(());
        }
        let Some(stage) = self.stages.get(&action.key()).await? else {
            tracing::debug!("stage no longer exists");
            return Ok(());
        };

        match stage.status.phase {
            StagePhase::Empty => self.start(&stage).await,
            StagePhase::Running => self.aggregate(&stage).await,
            StagePhase::Succeeded | StagePhase::Failed => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "stage_tests.rs"]
mod tests;
