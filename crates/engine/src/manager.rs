// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wires informers, caches and the four controllers together
//!
//! Change routing:
//! - pipeline events enqueue the pipeline
//! - stage events enqueue the stage and its owning pipeline
//! - job events enqueue the job and its owning stage
//! - workload events enqueue the workload

use crate::config::ControllerConfig;
use crate::context::{Caches, Clients};
use crate::controller::{Controller, HasSynced};
use crate::error::ControllerError;
use crate::informer::{EnqueueObject, EnqueueOwner, Informer};
use crate::job::JobReconciler;
use crate::pipeline::{PipelineReconciler, PipelineResync};
use crate::queue::{ActionQueue, RateLimiter};
use crate::stage::StageReconciler;
use crate::workload::WorkloadReconciler;
use crate::workload_template::{DefaultWorkloadTemplate, WorkloadTemplate};
use relay_core::{Clock, IdGen, Resource};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

type Tasks = JoinSet<Result<(), ControllerError>>;

pub struct ControllerManager<C: Clock, I: IdGen> {
    clients: Clients,
    config: Arc<ControllerConfig>,
    clock: C,
    ids: I,
    template: Arc<dyn WorkloadTemplate>,
    caches: Caches,
}

impl<C: Clock, I: IdGen> ControllerManager<C, I> {
    pub fn new(clients: Clients, config: ControllerConfig, clock: C, ids: I) -> Self {
        Self {
            clients: clients.traced(),
            template: Arc::new(DefaultWorkloadTemplate::new(&config.runner)),
            config: Arc::new(config),
            clock,
            ids,
            caches: Caches::default(),
        }
    }

    pub fn with_workload_template(mut self, template: Arc<dyn WorkloadTemplate>) -> Self {
        self.template = template;
        self
    }

    /// Caches filled by the informers once `run` starts
    pub fn caches(&self) -> &Caches {
        &self.caches
    }

    /// Run every informer and controller until `cancel` fires
    ///
    /// The first controller error stops the rest and is returned once
    /// everything has exited.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), ControllerError> {
        let stop = cancel.child_token();
        let config = &self.config;
        let caches = &self.caches;
        let clients = &self.clients;
        let limiter = RateLimiter::new(config.rate_limit.base_delay, config.rate_limit.max_delay);

        let pipeline_queue = ActionQueue::new(limiter);
        let stage_queue = ActionQueue::new(limiter);
        let job_queue = ActionQueue::new(limiter);
        let workload_queue = ActionQueue::new(limiter);

        let mut tasks = Tasks::new();

        self.spawn_informer(
            &mut tasks,
            Informer::new(Arc::clone(&clients.pipelines), caches.pipelines.clone())
                .with_handler(Arc::new(EnqueueObject::new(pipeline_queue.clone()))),
            &stop,
        );
        self.spawn_informer(
            &mut tasks,
            Informer::new(Arc::clone(&clients.stages), caches.stages.clone())
                .with_handler(Arc::new(EnqueueObject::new(stage_queue.clone())))
                .with_handler(Arc::new(EnqueueOwner::new(
                    pipeline_queue.clone(),
                    caches.pipelines.clone(),
                ))),
            &stop,
        );
        self.spawn_informer(
            &mut tasks,
            Informer::new(Arc::clone(&clients.jobs), caches.jobs.clone())
                .with_handler(Arc::new(EnqueueObject::new(job_queue.clone())))
                .with_handler(Arc::new(EnqueueOwner::new(
                    stage_queue.clone(),
                    caches.stages.clone(),
                ))),
            &stop,
        );
        self.spawn_informer(
            &mut tasks,
            Informer::new(Arc::clone(&clients.workloads), caches.workloads.clone())
                .with_handler(Arc::new(EnqueueObject::new(workload_queue.clone()))),
            &stop,
        );

        let pipelines = Controller::new("pipeline", pipeline_queue.clone())
            .with_handler(Arc::new(PipelineReconciler::new(
                clients.clone(),
                caches.clone(),
                Arc::clone(config),
                self.clock.clone(),
                self.ids.clone(),
                stop.clone(),
            )))
            .with_resync(
                config.resync_period,
                Arc::new(PipelineResync::new(pipeline_queue, caches.pipelines.clone())),
            );
        let stages = Controller::new("stage", stage_queue).with_handler(Arc::new(
            StageReconciler::new(clients.clone(), caches, self.clock.clone()),
        ));
        let jobs = Controller::new("job", job_queue).with_handler(Arc::new(JobReconciler::new(
            clients.clone(),
            caches,
            Arc::clone(&self.template),
            config.runner.service_account_prefix.clone(),
            self.clock.clone(),
        )));
        let workloads = Controller::new("workload", workload_queue).with_handler(Arc::new(
            WorkloadReconciler::new(clients, caches, self.clock.clone()),
        ));

        let workers = config.workers;
        self.spawn_controller(&mut tasks, pipelines, workers.pipeline, &stop);
        self.spawn_controller(&mut tasks, stages, workers.stage, &stop);
        self.spawn_controller(&mut tasks, jobs, workers.job, &stop);
        self.spawn_controller(&mut tasks, workloads, workers.workload, &stop);
        tracing::info!(namespace = ?config.namespace, "controller manager started");

        let mut first = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "controller failed, stopping all");
                    stop.cancel();
                    first.get_or_insert(e);
                }
                Err(e) => {
                    tracing::error!(error = %e, "controller task panicked, stopping all");
                    stop.cancel();
                }
            }
        }
        tracing::info!("controller manager stopped");
        first.map_or(Ok(()), Err)
    }

    fn spawn_informer<K: Resource>(
        &self,
        tasks: &mut Tasks,
        informer: Informer<K>,
        stop: &CancellationToken,
    ) {
        let informer = informer.with_namespace(self.config.namespace.clone());
        let stop = stop.clone();
        tasks.spawn(async move {
            informer.run(stop).await;
            Ok(())
        });
    }

    /// Every controller waits for all four caches
    fn spawn_controller<K: Resource>(
        &self,
        tasks: &mut Tasks,
        controller: Controller<K>,
        workers: usize,
        stop: &CancellationToken,
    ) {
        let checks: [Arc<dyn HasSynced>; 4] = [
            Arc::new(self.caches.pipelines.clone()),
            Arc::new(self.caches.stages.clone()),
            Arc::new(self.caches.jobs.clone()),
            Arc::new(self.caches.workloads.clone()),
        ];
        let controller = checks
            .into_iter()
            .fold(controller, Controller::with_sync_check)
            .with_cache_sync_timeout(self.config.cache_sync_timeout);
        tasks.spawn(controller.run(stop.clone(), workers));
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
