//! Admission: queued pipelines wait for a running slot in their namespace

use crate::prelude::*;

fn limited(max_running: usize) -> ControllerConfig {
    ControllerConfig {
        max_running_pipelines: max_running,
        resync_period: Duration::from_millis(50),
        ..ControllerConfig::default()
    }
}

fn single_job(stage: &str) -> PipelineSpec {
    spec(&[stage], vec![job("compile", stage)])
}

#[tokio::test]
async fn valid_pipeline_is_queued_then_admitted() {
    let cluster = Cluster::new(Workloads::Manual).start(limited(1));
    cluster.submit("a", single_job("build"));

    cluster.wait_for_phase("a", PipelinePhase::Running).await;

    let pipeline = cluster.pipeline("a");
    assert_eq!(pipeline.status.stage_index, 1);
    assert!(pipeline.status.start_time.is_some());
    assert!(pipeline.status.end_time.is_none());
    cluster.stop().await;
}

#[tokio::test]
async fn second_pipeline_waits_until_the_first_finishes() {
    let cluster = Cluster::new(Workloads::Manual).start(limited(1));
    cluster.submit("a", single_job("build"));
    cluster.wait_for_phase("a", PipelinePhase::Running).await;

    cluster.submit("b", single_job("build"));
    cluster.wait_for_phase("b", PipelinePhase::Queued).await;
    let waited = holds_for(200, || cluster.phase("b") == PipelinePhase::Queued).await;
    assert!(waited, "b should stay queued while a holds the only slot");

    let created = wait_for(SPEC_WAIT_MAX_MS, || {
        cluster.fakes.workloads.stored(NAMESPACE, "a-stage-1-compile").is_some()
    })
    .await;
    assert!(created, "a's workload should be created");
    cluster.finish_workload("a-stage-1-compile", true);

    cluster.wait_for_phase("a", PipelinePhase::Completed).await;
    cluster.wait_for_phase("b", PipelinePhase::Running).await;
    cluster.stop().await;
}

#[tokio::test]
async fn pipelines_within_the_limit_run_side_by_side() {
    let cluster = Cluster::new(Workloads::Manual).start(limited(2));
    cluster.submit("a", single_job("build"));
    cluster.submit("b", single_job("build"));

    cluster.wait_for_phase("a", PipelinePhase::Running).await;
    cluster.wait_for_phase("b", PipelinePhase::Running).await;
    cluster.stop().await;
}
