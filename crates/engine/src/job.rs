// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PipelineJob phase machine
//!
//! Empty jobs are validated and queued; queued jobs are marked Running and
//! then their workload is submitted. Completion arrives through the
//! workload reconciler.

use crate::context::{Caches, Clients};
use crate::controller::Reconcile;
use crate::error::ReconcileError;
use crate::informer::Lister;
use crate::patcher::StatusPatcher;
use crate::queue::SyncAction;
use crate::rbac::runner_name;
use crate::workload_template::WorkloadTemplate;
use async_trait::async_trait;
use relay_core::{Clock, JobPhase, PipelineJob, Resource, Workload};
use relay_definition::validate_job;
use std::sync::Arc;

pub struct JobReconciler<C: Clock> {
    clients: Clients,
    jobs: Lister<PipelineJob>,
    workloads: Lister<Workload>,
    patcher: StatusPatcher<PipelineJob>,
    template: Arc<dyn WorkloadTemplate>,
    runner_prefix: String,
    clock: C,
}

impl<C: Clock> JobReconciler<C> {
    pub fn new(
        clients: Clients,
        caches: &Caches,
        template: Arc<dyn WorkloadTemplate>,
        runner_prefix: impl Into<String>,
        clock: C,
    ) -> Self {
        Self {
            jobs: Lister::new(Arc::clone(&clients.jobs), caches.jobs.clone()),
            workloads: Lister::new(Arc::clone(&clients.workloads), caches.workloads.clone()),
            patcher: StatusPatcher::new(Arc::clone(&clients.jobs), caches.jobs.clone()),
            clients,
            template,
            runner_prefix: runner_prefix.into(),
            clock,
        }
    }

    async fn patch(
        &self,
        original: &PipelineJob,
        modified: &PipelineJob,
    ) -> Result<(), ReconcileError> {
        match self.patcher.patch(original, modified).await {
            Err(e) if !e.is_not_found() => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn validate(&self, job: &PipelineJob) -> Result<(), ReconcileError> {
        let mut modified = job.clone();
        match validate_job(&job.spec.job) {
            Ok(()) => modified.status.queue(),
            Err(e) => {
                tracing::warn!(error = %e, "job invalid");
                modified.status.fail(e.to_string(), self.clock.now());
            }
        }
        self.patch(job, &modified).await
    }

    async fn start(&self, job: &PipelineJob) -> Result<(), ReconcileError> {
        let mut modified = job.clone();
        modified.status.start(self.clock.now());
        self.patch(job, &modified).await
    }

    /// Submit the workload unless it already exists
    async fn submit(&self, job: &PipelineJob) -> Result<(), ReconcileError> {
        if self.workloads.get(&job.key()).await?.is_some() {
            return Ok(());
        }
        let account = runner_name(&self.runner_prefix, &job.spec.pipeline);
        let workload = self.template.render(job, Some(&account));
        match self.clients.workloads.create(&workload).await {
            Ok(_) => {
                tracing::info!(image = %workload.spec.image, "workload submitted");
                Ok(())
            }
            Err(e) if e.is_already_exists() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl<C: Clock> Reconcile<PipelineJob> for JobReconciler<C> {
    async fn reconcile(&self, action: SyncAction<PipelineJob>) -> Result<(), ReconcileError> {
        if let SyncAction::Delete(_) = action {
            return Ok(());
        }
        let Some(job) = self.jobs.get(&action.key()).await? else {
            tracing::debug!("job no longer exists");
            return Ok(());
        };

        match job.status.phase {
            JobPhase::Empty => self.validate(&job).await,
            JobPhase::Queued => self.start(&job).await,
            JobPhase::Running => self.submit(&job).await,
            JobPhase::Succeeded | JobPhase::Failed => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
