//! Execution: stages run one after another and everything derived is cleaned up

use crate::prelude::*;
use relay_core::labels;

fn two_stages() -> PipelineSpec {
    spec(
        &["build", "test"],
        vec![job("compile", "build"), job("unit", "test"), job("lint", "test")],
    )
}

async fn wait_for_workload(cluster: &Cluster, name: &str) {
    let created = wait_for(SPEC_WAIT_MAX_MS, || {
        cluster.fakes.workloads.stored(NAMESPACE, name).is_some()
    })
    .await;
    assert!(created, "workload {} should be created", name);
}

#[tokio::test]
async fn stages_run_in_order() {
    let cluster = Cluster::new(Workloads::Manual).start(ControllerConfig::default());
    cluster.submit("ship", two_stages());

    wait_for_workload(&cluster, "ship-stage-1-compile").await;
    assert!(cluster.fakes.stages.stored(NAMESPACE, "ship-stage-2").is_none());
    assert!(cluster.fakes.workloads.stored(NAMESPACE, "ship-stage-2-unit").is_none());

    cluster.finish_workload("ship-stage-1-compile", true);
    wait_for_workload(&cluster, "ship-stage-2-unit").await;
    wait_for_workload(&cluster, "ship-stage-2-lint").await;
    assert_eq!(cluster.pipeline("ship").status.stage_index, 2);

    cluster.finish_workload("ship-stage-2-unit", true);
    let holding = holds_for(100, || cluster.phase("ship") == PipelinePhase::Running).await;
    assert!(holding, "stage should wait for every job");

    cluster.finish_workload("ship-stage-2-lint", true);
    cluster.wait_for_phase("ship", PipelinePhase::Completed).await;
    cluster.stop().await;
}

#[tokio::test]
async fn completed_pipeline_records_history_and_cleans_up() {
    let cluster = Cluster::new(Workloads::Succeed).start(ControllerConfig::default());
    cluster.submit("ship", two_stages());

    cluster.wait_for_phase("ship", PipelinePhase::Completed).await;
    let cleaned = wait_for(SPEC_WAIT_MAX_MS, || {
        let fakes = &cluster.fakes;
        fakes.stages.objects().is_empty()
            && fakes.jobs.objects().is_empty()
            && fakes.workloads.objects().is_empty()
            && fakes.deployments.objects().is_empty()
            && fakes.service_accounts.objects().is_empty()
    })
    .await;
    assert!(cleaned, "derived objects should be removed");

    let status = cluster.pipeline("ship").status;
    assert_eq!(status.stage_index, 2);
    assert!(status.end_time.is_some());
    assert!(status.failure_reason.is_none());
    assert_eq!(status.stages.len(), 2);
    assert_eq!(status.stages[1].jobs.len(), 2);
    assert_eq!(status.stages[1].jobs[0].resource, vec!["ship-stage-2-unit".to_string()]);
    assert!(status.stages.iter().flat_map(|s| &s.jobs).all(|j| j.end_time.is_some()));
    assert!(cluster.fakes.object_store.has_bucket("ship"));
    cluster.stop().await;
}

#[tokio::test]
async fn workloads_carry_expanded_environment() {
    let cluster = Cluster::new(Workloads::Manual).start(ControllerConfig::default());
    let mut manifest = spec(&["build"], vec![job("compile", "build")]);
    manifest.environment = vec!["CI=true".to_string()];
    manifest.templates = vec![JobTemplate {
        name: "rust".to_string(),
        image: Some("rust:1".to_string()),
        environment: vec!["RUST_LOG=debug".to_string()],
        ..JobTemplate::default()
    }];
    manifest.jobs[0].image = None;
    manifest.jobs[0].extends = vec!["rust".to_string()];
    manifest.jobs[0].environment = vec!["RUST_LOG=info".to_string()];
    cluster.submit("ship", manifest);

    wait_for_workload(&cluster, "ship-stage-1-compile").await;

    let workload = cluster
        .fakes
        .workloads
        .stored(NAMESPACE, "ship-stage-1-compile")
        .unwrap();
    assert_eq!(workload.spec.image, "rust:1");
    assert_eq!(workload.spec.env.get("CI").map(String::as_str), Some("true"));
    assert_eq!(workload.spec.env.get("RUST_LOG").map(String::as_str), Some("info"));
    assert_eq!(workload.metadata.label(labels::PIPELINE), Some("ship"));
    assert_eq!(workload.metadata.label(labels::STAGE), Some("ship-stage-1"));
    assert_eq!(workload.metadata.label(labels::JOB), Some("compile"));
    cluster.stop().await;
}

#[tokio::test]
async fn allowed_failure_does_not_fail_the_stage() {
    let cluster = Cluster::new(Workloads::Fail).start(ControllerConfig::default());
    let mut manifest = spec(&["test"], vec![job("flaky", "test")]);
    manifest.jobs[0].allow_failure = true;
    cluster.submit("ship", manifest);

    cluster.wait_for_phase("ship", PipelinePhase::Completed).await;
    cluster.stop().await;
}
