// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::testing::{with_tracing, FakeClients};
use relay_adapters::ApiVerb;
use relay_core::{FakeClock, JobPhase, ObjectMeta, WorkloadStatus};
use yare::parameterized;

struct Fixture {
    fakes: FakeClients,
    reconciler: WorkloadReconciler<FakeClock>,
}

fn fixture() -> Fixture {
    let fakes = FakeClients::new();
    let reconciler = WorkloadReconciler::new(&fakes.clients(), &Caches::default(), FakeClock::new());
    Fixture { fakes, reconciler }
}

fn seed_job(fx: &Fixture, phase: JobPhase) -> PipelineJob {
    let mut job = PipelineJob {
        metadata: ObjectMeta::new("ci", "build-stage-1-unit"),
        ..PipelineJob::default()
    };
    job.status.phase = phase;
    fx.fakes.jobs.seed(job)
}

fn seed_workload(fx: &Fixture, owner: &PipelineJob, status: WorkloadStatus) -> Workload {
    let workload = Workload {
        metadata: ObjectMeta::new("ci", owner.name()).with_owner(owner.controller_reference()),
        status,
        ..Workload::default()
    };
    fx.fakes.workloads.seed(workload)
}

fn status(succeeded: u32, failed: u32) -> WorkloadStatus {
    WorkloadStatus {
        active: 0,
        succeeded,
        failed,
    }
}

#[parameterized(
    succeeded = { 1, 0, JobPhase::Succeeded },
    failed = { 0, 1, JobPhase::Failed },
)]
#[test_macro(tokio::test)]
async fn finished_workload_finishes_running_job(succeeded: u32, failed: u32, expected: JobPhase) {
    let fx = fixture();
    let job = seed_job(&fx, JobPhase::Running);
    let workload = seed_workload(&fx, &job, status(succeeded, failed));

    fx.reconciler
        .reconcile(SyncAction::Update(workload))
        .await
        .unwrap();

    let stored = fx.fakes.jobs.stored("ci", "build-stage-1-unit").unwrap();
    assert_eq!(stored.status.phase, expected);
    assert!(stored.status.end_time.is_some());
    if expected == JobPhase::Failed {
        assert_eq!(
            stored.status.failure_reason.as_deref(),
            Some("workload build-stage-1-unit failed")
        );
    }
}

#[tokio::test]
async fn active_workload_changes_nothing() {
    let fx = fixture();
    let job = seed_job(&fx, JobPhase::Running);
    let workload = seed_workload(
        &fx,
        &job,
        WorkloadStatus {
            active: 1,
            ..WorkloadStatus::default()
        },
    );

    fx.reconciler
        .reconcile(SyncAction::Update(workload))
        .await
        .unwrap();

    assert!(fx.fakes.jobs.calls_of(ApiVerb::Patch).is_empty());
}

#[tokio::test]
async fn failed_pod_within_backoff_limit_keeps_job_running() {
    let fx = fixture();
    let job = seed_job(&fx, JobPhase::Running);
    let mut retrying = Workload {
        metadata: ObjectMeta::new("ci", job.name()).with_owner(job.controller_reference()),
        status: WorkloadStatus {
            active: 1,
            succeeded: 0,
            failed: 1,
        },
        ..Workload::default()
    };
    retrying.spec.backoff_limit = 2;
    let workload = fx.fakes.workloads.seed(retrying);

    fx.reconciler
        .reconcile(SyncAction::Update(workload))
        .await
        .unwrap();

    assert!(fx.fakes.jobs.calls_of(ApiVerb::Patch).is_empty());
    let stored = fx.fakes.jobs.stored("ci", "build-stage-1-unit").unwrap();
    assert_eq!(stored.status.phase, JobPhase::Running);
}

#[tokio::test]
async fn finished_job_is_not_patched_again() {
    let fx = fixture();
    let job = seed_job(&fx, JobPhase::Succeeded);
    let workload = seed_workload(&fx, &job, status(0, 1));

    fx.reconciler
        .reconcile(SyncAction::Update(workload))
        .await
        .unwrap();

    assert!(fx.fakes.jobs.calls_of(ApiVerb::Patch).is_empty());
}

#[tokio::test]
async fn orphan_workload_is_ignored() {
    let fx = fixture();
    let workload = fx.fakes.workloads.seed(Workload {
        metadata: ObjectMeta::new("ci", "stray"),
        status: status(1, 0),
        ..Workload::default()
    });

    fx.reconciler
        .reconcile(SyncAction::Update(workload))
        .await
        .unwrap();

    assert!(fx.fakes.jobs.calls().is_empty());
}

#[test]
fn vanished_workload_is_logged_and_ignored() {
    let fx = fixture();
    let workload = Workload {
        metadata: ObjectMeta::new("ci", "build-stage-1-unit"),
        status: status(1, 0),
        ..Workload::default()
    };

    let (logs, result) =
        with_tracing(|| fx.reconciler.reconcile(SyncAction::Update(workload)));

    assert!(result.is_ok());
    assert!(logs.contains("workload no longer exists"), "Logs:\n{}", logs);
    assert!(fx.fakes.jobs.calls().is_empty());
}
