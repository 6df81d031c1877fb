//! Failure: invalid definitions and failed jobs end the pipeline

use crate::prelude::*;

#[tokio::test]
async fn stage_without_jobs_fails_before_admission() {
    let cluster = Cluster::new(Workloads::Succeed).start(ControllerConfig::default());
    cluster.submit("broken", spec(&["a", "b"], vec![job("compile", "a")]));

    cluster.wait_for_phase("broken", PipelinePhase::Failed).await;

    let status = cluster.pipeline("broken").status;
    assert_eq!(status.stage_index, 2);
    assert_eq!(status.failure_reason.as_deref(), Some(r#"stage "b" has no jobs"#));
    assert!(status.start_time.is_none());
    let untouched = holds_for(100, || {
        cluster.fakes.stages.objects().is_empty() && cluster.fakes.deployments.objects().is_empty()
    })
    .await;
    assert!(untouched, "nothing should be provisioned for an invalid pipeline");
    cluster.stop().await;
}

// Expansion alone skips unknown templates; validation on admission does not
#[tokio::test]
async fn unknown_template_fails_the_pipeline() {
    let cluster = Cluster::new(Workloads::Succeed).start(ControllerConfig::default());
    let mut manifest = spec(&["build"], vec![job("compile", "build")]);
    manifest.jobs[0].extends = vec!["missing".to_string()];
    cluster.submit("broken", manifest);

    cluster.wait_for_phase("broken", PipelinePhase::Failed).await;

    let reason = cluster.pipeline("broken").status.failure_reason.unwrap();
    assert!(reason.contains("missing"), "reason was {:?}", reason);
    cluster.stop().await;
}

#[tokio::test]
async fn failed_job_fails_the_pipeline_and_skips_later_stages() {
    let cluster = Cluster::new(Workloads::Fail).start(ControllerConfig::default());
    cluster.submit(
        "ship",
        spec(&["build", "test"], vec![job("compile", "build"), job("unit", "test")]),
    );

    cluster.wait_for_phase("ship", PipelinePhase::Failed).await;

    let status = cluster.pipeline("ship").status;
    assert_eq!(status.stage_index, 2);
    assert_eq!(
        status.failure_reason.as_deref(),
        Some("stage build failed: job compile failed: workload ship-stage-1-compile failed")
    );
    assert!(cluster.fakes.workloads.stored(NAMESPACE, "ship-stage-2-unit").is_none());
    let cleaned = wait_for(SPEC_WAIT_MAX_MS, || {
        cluster.fakes.stages.objects().is_empty() && cluster.fakes.deployments.objects().is_empty()
    })
    .await;
    assert!(cleaned, "failed pipeline should be cleaned up");
    cluster.stop().await;
}
