// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline phase machine
//!
//! Empty pipelines are validated and queued, queued pipelines are admitted
//! up to a per-namespace limit, running pipelines get their storage server,
//! runner identity and one stage object at a time, and finished pipelines
//! have everything derived from them deleted.

use crate::config::ControllerConfig;
use crate::context::{job_object_name, stage_object_name, Caches, Clients};
use crate::controller::{Reconcile, Resync};
use crate::error::ReconcileError;
use crate::informer::Lister;
use crate::patcher::StatusPatcher;
use crate::queue::{ActionQueue, SyncAction};
use crate::rbac::RunnerAccess;
use crate::storage_server::{StorageServer, StorageServerError};
use async_trait::async_trait;
use relay_adapters::ApiError;
use relay_core::{
    labels, Clock, IdGen, JobRecord, LabelSelector, ObjectKey, ObjectMeta, Pipeline,
    PipelinePhase, PipelineStage, Resource, StagePhase, StageRecord, StageSpec, Workspace,
};
use relay_definition::{resolve_stage, validate_pipeline};
use relay_storage::ObjectCache;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub struct PipelineReconciler<C: Clock, I: IdGen> {
    clients: Clients,
    caches: Caches,
    pipelines: Lister<Pipeline>,
    stages: Lister<PipelineStage>,
    patcher: StatusPatcher<Pipeline>,
    config: Arc<ControllerConfig>,
    clock: C,
    ids: I,
    admission: Mutex<()>,
    cancel: CancellationToken,
}

impl<C: Clock, I: IdGen> PipelineReconciler<C, I> {
    pub fn new(
        clients: Clients,
        caches: Caches,
        config: Arc<ControllerConfig>,
        clock: C,
        ids: I,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            pipelines: Lister::new(Arc::clone(&clients.pipelines), caches.pipelines.clone()),
            stages: Lister::new(Arc::clone(&clients.stages), caches.stages.clone()),
            patcher: StatusPatcher::new(Arc::clone(&clients.pipelines), caches.pipelines.clone()),
            clients,
            caches,
            config,
            clock,
            ids,
            admission: Mutex::new(()),
            cancel,
        }
    }

    /// A pipeline deleted while we were working on it is not an error
    async fn patch(&self, original: &Pipeline, modified: &Pipeline) -> Result<(), ReconcileError> {
        match self.patcher.patch(original, modified).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::debug!("pipeline vanished before status patch");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn fail(&self, pipeline: &Pipeline, reason: String) -> Result<(), ReconcileError> {
        tracing::warn!(reason = %reason, "pipeline failed");
        let mut modified = pipeline.clone();
        modified
            .status
            .fail(reason, pipeline.spec.stages.len(), self.clock.now());
        self.patch(pipeline, &modified).await
    }

    async fn validate(&self, pipeline: &Pipeline) -> Result<(), ReconcileError> {
        if let Err(e) = validate_pipeline(&pipeline.spec) {
            return self.fail(pipeline, e.to_string()).await;
        }
        let mut modified = pipeline.clone();
        modified.status.queue(self.clock.now());
        self.patch(pipeline, &modified).await?;
        tracing::info!("pipeline queued");
        Ok(())
    }

    async fn admit(&self, pipeline: &Pipeline) -> Result<(), ReconcileError> {
        if let Err(e) = validate_pipeline(&pipeline.spec) {
            return self.fail(pipeline, e.to_string()).await;
        }

        // Held across the patch so two workers cannot both take the last slot
        let _admission = self.admission.lock().await;
        let key = pipeline.key();
        let running = self
            .caches
            .pipelines
            .list(Some(pipeline.namespace()))
            .iter()
            .filter(|p| p.status.phase == PipelinePhase::Running && p.key() != key)
            .count();
        let max = self.config.max_running_pipelines;
        if running >= max {
            tracing::debug!(running, max, "admission deferred");
            return Ok(());
        }

        let mut modified = pipeline.clone();
        modified
            .status
            .start(pipeline.spec.stages.len(), self.clock.now());
        self.patch(pipeline, &modified).await?;
        tracing::info!(running = running + 1, max, "pipeline admitted");
        Ok(())
    }

    async fn run_stage(&self, pipeline: &Pipeline) -> Result<(), ReconcileError> {
        let index = pipeline.status.stage_index;
        let Some(stage_name) = pipeline.spec.stage_at(index) else {
            return Err(ReconcileError::fatal(format!(
                "running pipeline {} has stage index {} of {}",
                pipeline.key(),
                index,
                pipeline.spec.stages.len()
            )));
        };

        RunnerAccess::for_pipeline(
            self.clients.rbac_apis(),
            &self.config.runner.service_account_prefix,
            pipeline,
        )
        .ensure()
        .await?;
        let storage = self.ensure_storage(pipeline).await?;
        let bucket = bucket_name(pipeline);
        self.clients
            .object_store
            .create_bucket(&storage.endpoint()?, &bucket)
            .await?;

        let stage_key = ObjectKey::new(
            pipeline.namespace(),
            stage_object_name(pipeline.name(), index),
        );
        match self.stages.get(&stage_key).await? {
            None => {
                let workspace = Workspace {
                    path: pipeline.spec.workspace.path.clone(),
                    storage: storage.storage_config(&bucket)?,
                    repo: pipeline.spec.workspace.repo.clone(),
                };
                self.create_stage(pipeline, stage_key, stage_name, workspace)
                    .await
            }
            Some(stage) => self.observe_stage(pipeline, &stage).await,
        }
    }

    async fn ensure_storage(
        &self,
        pipeline: &Pipeline,
    ) -> Result<StorageServer<I>, ReconcileError> {
        let mut storage = StorageServer::for_pipeline(
            self.clients.storage_apis(),
            self.config.storage.clone(),
            self.ids.clone(),
            pipeline,
        );
        storage.create().await?;
        let name = storage.name();
        storage
            .wait_for_availability(
                self.config.storage.availability_timeout,
                self.cancel.child_token(),
            )
            .await
            .map_err(|_| StorageServerError::Cancelled(name))??;
        Ok(storage)
    }

    async fn create_stage(
        &self,
        pipeline: &Pipeline,
        key: ObjectKey,
        stage_name: &str,
        workspace: Workspace,
    ) -> Result<(), ReconcileError> {
        let jobs = match resolve_stage(&pipeline.spec, stage_name) {
            Ok(jobs) => jobs,
            Err(e) => return self.fail(pipeline, e.to_string()).await,
        };
        let index = pipeline.status.stage_index;

        let stage = PipelineStage {
            metadata: ObjectMeta::new(&key.namespace, &key.name)
                .with_label(labels::PIPELINE, pipeline.name())
                .with_owner(pipeline.controller_reference()),
            spec: StageSpec {
                pipeline: pipeline.name().to_string(),
                index,
                name: stage_name.to_string(),
                workspace,
                jobs,
            },
            ..PipelineStage::default()
        };
        match self.clients.stages.create(&stage).await {
            Ok(_) => {
                tracing::info!(stage = %key.name, jobs = stage.spec.jobs.len(), "stage created")
            }
            Err(e) if e.is_already_exists() => {}
            Err(e) => return Err(e.into()),
        }

        let mut modified = pipeline.clone();
        if modified.status.stage_record_mut(index).is_none() {
            let jobs = stage
                .spec
                .jobs
                .iter()
                .enumerate()
                .map(|(i, job)| JobRecord {
                    index: i + 1,
                    resource: vec![job_object_name(&key.name, &job.name)],
                    ..JobRecord::default()
                })
                .collect();
            modified.status.stages.push(StageRecord { index, jobs });
            modified.status.last_updated = Some(self.clock.now());
        }
        self.patch(pipeline, &modified).await
    }

    async fn observe_stage(
        &self,
        pipeline: &Pipeline,
        stage: &PipelineStage,
    ) -> Result<(), ReconcileError> {
        let stage_count = pipeline.spec.stages.len();
        let mut modified = pipeline.clone();
        match stage.status.phase {
            StagePhase::Empty | StagePhase::Running => {
                tracing::trace!(
                    stage = %stage.name(),
                    phase = %stage.status.phase,
                    "stage in progress"
                );
                return Ok(());
            }
            StagePhase::Succeeded => {
                self.record_job_times(&mut modified, stage);
                if modified.status.advance(stage_count, self.clock.now()) {
                    tracing::info!("pipeline completed");
                } else {
                    tracing::info!(
                        stage_index = modified.status.stage_index,
                        "advanced to next stage"
                    );
                }
            }
            StagePhase::Failed => {
                self.record_job_times(&mut modified, stage);
                let reason = format!(
                    "stage {} failed: {}",
                    stage.spec.name,
                    stage.status.failure_reason.as_deref().unwrap_or("unknown")
                );
                tracing::warn!(reason = %reason, "pipeline failed");
                modified.status.fail(reason, stage_count, self.clock.now());
            }
        }
        self.patch(pipeline, &modified).await?;

        // Superseded; the final stage goes with the rest of the cleanup
        if modified.status.phase == PipelinePhase::Running {
            self.delete_stage(stage).await?;
        }
        Ok(())
    }

    fn record_job_times(&self, pipeline: &mut Pipeline, stage: &PipelineStage) {
        let namespace = stage.namespace().to_string();
        let Some(record) = pipeline.status.stage_record_mut(stage.spec.index) else {
            return;
        };
        for job in &mut record.jobs {
            let Some(name) = job.resource.first() else {
                continue;
            };
            if let Some(object) = self.caches.jobs.get(&ObjectKey::new(&namespace, name)) {
                job.start_time = object.status.start_time;
                job.end_time = object.status.end_time;
            }
        }
    }

    async fn delete_stage(&self, stage: &PipelineStage) -> Result<(), ReconcileError> {
        let selector = LabelSelector::everything()
            .with(labels::PIPELINE, &stage.spec.pipeline)
            .with(labels::STAGE, stage.name());
        let namespace = stage.namespace();
        for workload in self.clients.workloads.list(Some(namespace), &selector).await? {
            missing_ok(self.clients.workloads.delete(namespace, workload.name()).await)?;
        }
        for job in self.clients.jobs.list(Some(namespace), &selector).await? {
            missing_ok(self.clients.jobs.delete(namespace, job.name()).await)?;
        }
        missing_ok(self.clients.stages.delete(namespace, stage.name()).await)?;
        tracing::debug!(stage = %stage.name(), "stage deleted");
        Ok(())
    }

    /// Delete everything derived from the pipeline; safe to repeat
    async fn cleanup(&self, pipeline: &Pipeline) -> Result<(), ReconcileError> {
        let namespace = pipeline.namespace();
        let selector = LabelSelector::everything().with(labels::PIPELINE, pipeline.name());

        for workload in self.clients.workloads.list(Some(namespace), &selector).await? {
            missing_ok(self.clients.workloads.delete(namespace, workload.name()).await)?;
        }
        for job in self.clients.jobs.list(Some(namespace), &selector).await? {
            missing_ok(self.clients.jobs.delete(namespace, job.name()).await)?;
        }
        for stage in self.clients.stages.list(Some(namespace), &selector).await? {
            missing_ok(self.clients.stages.delete(namespace, stage.name()).await)?;
        }
        StorageServer::for_pipeline(
            self.clients.storage_apis(),
            self.config.storage.clone(),
            self.ids.clone(),
            pipeline,
        )
        .delete()
        .await?;
        RunnerAccess::for_pipeline(
            self.clients.rbac_apis(),
            &self.config.runner.service_account_prefix,
            pipeline,
        )
        .remove()
        .await?;

        tracing::debug!("derived resources cleaned up");
        Ok(())
    }
}

#[async_trait]
impl<C: Clock, I: IdGen> Reconcile<Pipeline> for PipelineReconciler<C, I> {
    async fn reconcile(&self, action: SyncAction<Pipeline>) -> Result<(), ReconcileError> {
        if let SyncAction::Delete(pipeline) = &action {
            tracing::info!("pipeline deleted");
            return self.cleanup(pipeline).await;
        }

        let Some(pipeline) = self.pipelines.get(&action.key()).await? else {
            tracing::debug!("pipeline no longer exists");
            return Ok(());
        };
        if pipeline.metadata.is_deleting() {
            return self.cleanup(&pipeline).await;
        }

        match pipeline.status.phase {
            PipelinePhase::Empty => self.validate(&pipeline).await,
            PipelinePhase::Queued => self.admit(&pipeline).await,
            PipelinePhase::Running => self.run_stage(&pipeline).await,
            PipelinePhase::Completed | PipelinePhase::Failed => self.cleanup(&pipeline).await,
        }
    }
}

/// Periodically re-enqueues queued pipelines so deferred admissions retry
pub struct PipelineResync {
    queue: ActionQueue<SyncAction<Pipeline>>,
    cache: ObjectCache<Pipeline>,
}

impl PipelineResync {
    pub fn new(queue: ActionQueue<SyncAction<Pipeline>>, cache: ObjectCache<Pipeline>) -> Self {
        Self { queue, cache }
    }
}

#[async_trait]
impl Resync for PipelineResync {
    async fn resync(&self) -> Result<(), ReconcileError> {
        let queued: Vec<Pipeline> = self
            .cache
            .list(None)
            .into_iter()
            .filter(|p| p.status.phase == PipelinePhase::Queued)
            .collect();
        tracing::debug!(queued = queued.len(), "resync");
        for pipeline in queued {
            self.queue.add(pipeline.key(), SyncAction::Update(pipeline));
        }
        Ok(())
    }
}

/// Workspace bucket, defaulting to the pipeline's name
pub fn bucket_name(pipeline: &Pipeline) -> String {
    let configured = &pipeline.spec.workspace.storage.s3.bucket_name;
    if configured.is_empty() {
        pipeline.name().to_string()
    } else {
        configured.clone()
    }
}

fn missing_ok(result: Result<(), ApiError>) -> Result<(), ApiError> {
    match result {
        Err(e) if !e.is_not_found() => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
