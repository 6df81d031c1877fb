// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::testing::{with_tracing, FakeClients};
use crate::workload_template::DefaultWorkloadTemplate;
use relay_adapters::ApiVerb;
use relay_core::{labels, FakeClock, ObjectMeta, PipelineJobSpec, ResolvedJob};

struct Fixture {
    fakes: FakeClients,
    reconciler: JobReconciler<FakeClock>,
}

fn fixture() -> Fixture {
    let fakes = FakeClients::new();
    let caches = Caches::default();
    let reconciler = JobReconciler::new(
        fakes.clients(),
        &caches,
        Arc::new(DefaultWorkloadTemplate::default()),
        "relay-runner-",
        FakeClock::new(),
    );
    Fixture { fakes, reconciler }
}

fn job(resolved: ResolvedJob) -> PipelineJob {
    PipelineJob {
        metadata: ObjectMeta::new("ci", "build-stage-1-unit")
            .with_label(labels::PIPELINE, "build")
            .with_label(labels::STAGE, "build-stage-1"),
        spec: PipelineJobSpec {
            pipeline: "build".to_string(),
            stage: "test".to_string(),
            job: resolved,
            ..PipelineJobSpec::default()
        },
        ..PipelineJob::default()
    }
}

fn unit() -> ResolvedJob {
    ResolvedJob {
        name: "unit".to_string(),
        image: "rust:1".to_string(),
        command: vec!["cargo".to_string(), "test".to_string()],
        ..ResolvedJob::default()
    }
}

impl Fixture {
    async fn reconcile(&self) -> Result<(), ReconcileError> {
        let job = self.stored();
        self.reconciler.reconcile(SyncAction::Update(job)).await
    }

    fn stored(&self) -> PipelineJob {
        self.fakes.jobs.stored("ci", "build-stage-1-unit").unwrap()
    }
}

#[tokio::test]
async fn job_walks_empty_queued_running() {
    let fx = fixture();
    fx.fakes.jobs.seed(job(unit()));

    fx.reconcile().await.unwrap();
    assert_eq!(fx.stored().status.phase, JobPhase::Queued);
    assert!(fx.fakes.workloads.objects().is_empty());

    fx.reconcile().await.unwrap();
    assert_eq!(fx.stored().status.phase, JobPhase::Running);
    assert!(fx.stored().status.start_time.is_some());
    assert!(fx.fakes.workloads.objects().is_empty());

    fx.reconcile().await.unwrap();
    let workload = fx.fakes.workloads.stored("ci", "build-stage-1-unit").unwrap();
    assert_eq!(workload.spec.image, "rust:1");
    assert_eq!(workload.spec.service_account.as_deref(), Some("relay-runner-build"));
    assert_eq!(workload.metadata.label(labels::STAGE), Some("build-stage-1"));
    assert_eq!(
        workload.metadata.controller_of_kind("PipelineJob"),
        Some("build-stage-1-unit")
    );
}

#[tokio::test]
async fn running_job_submits_its_workload_once() {
    let fx = fixture();
    let mut running = job(unit());
    running.status.phase = JobPhase::Running;
    fx.fakes.jobs.seed(running);

    fx.reconcile().await.unwrap();
    fx.reconcile().await.unwrap();

    assert_eq!(fx.fakes.workloads.calls_of(ApiVerb::Create).len(), 1);
}

#[tokio::test]
async fn invalid_job_fails() {
    let fx = fixture();
    let mut broken = unit();
    broken.image = String::new();
    fx.fakes.jobs.seed(job(broken));

    fx.reconcile().await.unwrap();

    let stored = fx.stored();
    assert_eq!(stored.status.phase, JobPhase::Failed);
    assert!(stored.status.failure_reason.is_some());
    assert!(stored.status.end_time.is_some());
}

#[tokio::test]
async fn finished_job_is_left_alone() {
    let fx = fixture();
    let mut done = job(unit());
    done.status.phase = JobPhase::Succeeded;
    fx.fakes.jobs.seed(done);

    fx.reconcile().await.unwrap();

    assert!(fx.fakes.workloads.objects().is_empty());
    assert!(fx.fakes.jobs.calls_of(ApiVerb::Patch).is_empty());
}

#[tokio::test]
async fn deleted_job_is_ignored() {
    let fx = fixture();

    fx.reconciler
        .reconcile(SyncAction::Delete(job(unit())))
        .await
        .unwrap();

    assert!(fx.fakes.jobs.calls().is_empty());
}

#[test]
fn vanished_job_is_logged_and_ignored() {
    let fx = fixture();

    let (logs, result) =
        with_tracing(|| fx.reconciler.reconcile(SyncAction::Update(job(unit()))));

    assert!(result.is_ok());
    assert!(logs.contains("job no longer exists"), "Logs:\n{}", logs);
    assert!(fx.fakes.workloads.calls().is_empty());
}
