//! Shared harness: a fake cluster with a running controller manager

#![allow(dead_code)]

pub use relay_core::{
    JobPhase, JobSpec, JobTemplate, ObjectMeta, Pipeline, PipelinePhase, PipelineSpec,
    StagePhase, Workload,
};
pub use relay_engine::{ControllerConfig, FakeClients};
pub use std::time::Duration;

use relay_adapters::FakeResourceApi;
use relay_core::{FakeClock, SequentialIdGen};
use relay_engine::{ControllerError, ControllerManager};
use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const NAMESPACE: &str = "ci";

/// Upper bound for any condition a spec waits on
pub const SPEC_WAIT_MAX_MS: u64 = 5_000;

/// How workloads created by the job controller behave
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workloads {
    /// Stay active until a spec finishes them
    Manual,
    /// Succeed as soon as they are created
    Succeed,
    /// Fail as soon as they are created
    Fail,
}

pub struct Cluster {
    pub fakes: FakeClients,
    cancel: CancellationToken,
    handle: Option<JoinHandle<Result<(), ControllerError>>>,
}

impl Cluster {
    pub fn new(workloads: Workloads) -> Self {
        let mut fakes = FakeClients::new();
        fakes.workloads = FakeResourceApi::new().with_create_hook(move |w: &mut Workload| {
            match workloads {
                Workloads::Manual => w.status.active = 1,
                Workloads::Succeed => w.status.succeeded = 1,
                Workloads::Fail => w.status.failed = 1,
            }
        });
        Self {
            fakes,
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    /// Start the manager with test-friendly storage polling
    pub fn start(mut self, mut config: ControllerConfig) -> Self {
        config.storage.poll_interval = Duration::from_millis(5);
        let manager = ControllerManager::new(
            self.fakes.clients(),
            config,
            FakeClock::new(),
            SequentialIdGen::new("key"),
        );
        self.handle = Some(tokio::spawn(manager.run(self.cancel.clone())));
        self
    }

    pub fn submit(&self, name: &str, spec: PipelineSpec) {
        self.fakes
            .pipelines
            .seed(Pipeline::new(ObjectMeta::new(NAMESPACE, name), spec));
    }

    pub fn pipeline(&self, name: &str) -> Pipeline {
        self.fakes.pipelines.stored(NAMESPACE, name).unwrap()
    }

    pub fn phase(&self, name: &str) -> PipelinePhase {
        self.pipeline(name).status.phase
    }

    /// Mark a workload finished, as the cluster would
    pub fn finish_workload(&self, name: &str, succeeded: bool) {
        self.fakes
            .workloads
            .modify(NAMESPACE, name, |w| {
                w.status.active = 0;
                if succeeded {
                    w.status.succeeded = 1;
                } else {
                    w.status.failed = 1;
                }
            })
            .unwrap();
    }

    pub async fn wait_for_phase(&self, name: &str, phase: PipelinePhase) {
        let reached = wait_for(SPEC_WAIT_MAX_MS, || {
            self.fakes
                .pipelines
                .stored(NAMESPACE, name)
                .is_some_and(|p| p.status.phase == phase)
        })
        .await;
        assert!(reached, "pipeline {} should reach {}", name, phase);
    }

    /// Cancel the manager and wait for it to exit cleanly
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let result = tokio::time::timeout(Duration::from_millis(SPEC_WAIT_MAX_MS), handle)
                .await
                .unwrap()
                .unwrap();
            assert!(result.is_ok(), "manager failed: {:?}", result);
        }
    }
}

/// Poll `condition` every 10ms until it holds or `max_ms` passes
pub async fn wait_for(max_ms: u64, condition: impl Fn() -> bool) -> bool {
    within(max_ms, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
}

/// Hold for `ms` and report whether `condition` stayed true throughout
pub async fn holds_for(ms: u64, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(ms);
    while tokio::time::Instant::now() < deadline {
        if !condition() {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    true
}

async fn within(max_ms: u64, fut: impl Future<Output = ()>) -> bool {
    tokio::time::timeout(Duration::from_millis(max_ms), fut)
        .await
        .is_ok()
}

pub fn job(name: &str, stage: &str) -> JobSpec {
    JobSpec {
        name: name.to_string(),
        image: Some("alpine:3".to_string()),
        stage: stage.to_string(),
        commands: vec!["true".to_string()],
        ..JobSpec::default()
    }
}

pub fn spec(stages: &[&str], jobs: Vec<JobSpec>) -> PipelineSpec {
    PipelineSpec {
        stages: stages.iter().map(|s| s.to_string()).collect(),
        jobs,
        ..PipelineSpec::default()
    }
}
