// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Moves a running PipelineJob to its final phase once its workload finishes

use crate::context::{Caches, Clients};
use crate::controller::Reconcile;
use crate::error::ReconcileError;
use crate::informer::Lister;
use crate::patcher::StatusPatcher;
use crate::queue::SyncAction;
use async_trait::async_trait;
use relay_core::{Clock, ObjectKey, PipelineJob, Resource, Workload, WorkloadOutcome};
use std::sync::Arc;

pub struct WorkloadReconciler<C: Clock> {
    workloads: Lister<Workload>,
    jobs: Lister<PipelineJob>,
    patcher: StatusPatcher<PipelineJob>,
    clock: C,
}

impl<C: Clock> WorkloadReconciler<C> {
    pub fn new(clients: &Clients, caches: &Caches, clock: C) -> Self {
        Self {
            workloads: Lister::new(Arc::clone(&clients.workloads), caches.workloads.clone()),
            jobs: Lister::new(Arc::clone(&clients.jobs), caches.jobs.clone()),
            patcher: StatusPatcher::new(Arc::clone(&clients.jobs), caches.jobs.clone()),
            clock,
        }
    }
}

#[async_trait]
impl<C: Clock> Reconcile<Workload> for WorkloadReconciler<C> {
    async fn reconcile(&self, action: SyncAction<Workload>) -> Result<(), ReconcileError> {
        if let SyncAction::Delete(_) = action {
            return Ok(());
        }
        let Some(workload) = self.workloads.get(&action.key()).await? else {
            tracing::debug!("workload no longer exists");
            return Ok(());
        };
        let Some(outcome) = workload.outcome() else {
            return Ok(());
        };
        let Some(owner) = workload.metadata.controller_of_kind(PipelineJob::KIND) else {
            tracing::debug!("workload has no owning job");
            return Ok(());
        };
        let Some(job) = self
            .jobs
            .get(&ObjectKey::new(workload.namespace(), owner))
            .await?
        else {
            return Ok(());
        };
        if job.status.phase.is_terminal() {
            return Ok(());
        }

        let mut modified = job.clone();
        let now = self.clock.now();
        match outcome {
            WorkloadOutcome::Succeeded => modified.status.succeed(now),
            WorkloadOutcome::Failed => {
                modified
                    .status
                    .fail(format!("workload {} failed", workload.name()), now);
            }
        }
        match self.patcher.patch(&job, &modified).await {
            Ok(_) => {
                tracing::info!(job = %job.name(), outcome = ?outcome, "job finished");
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "workload_tests.rs"]
mod tests;
