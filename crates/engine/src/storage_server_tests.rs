// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use relay_adapters::{ApiVerb, FakeResourceApi};
use relay_core::{PipelineSpec, SequentialIdGen};
use std::sync::Arc;

struct Fixture {
    secrets: FakeResourceApi<Secret>,
    deployments: FakeResourceApi<Deployment>,
    services: FakeResourceApi<Service>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            secrets: FakeResourceApi::new(),
            deployments: FakeResourceApi::new(),
            services: FakeResourceApi::new(),
        }
    }

    fn ready_on_create() -> Self {
        Self {
            deployments: FakeResourceApi::new()
                .with_create_hook(|d: &mut Deployment| d.status.ready_replicas = d.spec.replicas),
            ..Self::new()
        }
    }

    fn server(&self) -> StorageServer<SequentialIdGen> {
        let apis = StorageApis {
            secrets: Arc::new(self.secrets.clone()),
            deployments: Arc::new(self.deployments.clone()),
            services: Arc::new(self.services.clone()),
        };
        let config = StorageServerConfig {
            poll_interval: Duration::from_millis(5),
            ..StorageServerConfig::default()
        };
        let pipeline = Pipeline::new(ObjectMeta::new("ci", "build"), PipelineSpec::default());
        StorageServer::for_pipeline(apis, config, SequentialIdGen::new("key"), &pipeline)
    }
}

#[tokio::test]
async fn create_makes_secret_deployment_and_service() {
    let fx = Fixture::new();
    let mut server = fx.server();

    server.create().await.unwrap();

    let secret = fx.secrets.stored("ci", "build-storage").unwrap();
    assert_eq!(secret.string_data.len(), 2);
    let deployment = fx.deployments.stored("ci", "build-storage").unwrap();
    assert_eq!(deployment.spec.replicas, 1);
    assert_eq!(deployment.spec.env_from_secret.as_deref(), Some("build-storage"));
    assert_eq!(
        deployment.metadata.controller_of_kind("Pipeline"),
        Some("build")
    );
    assert!(fx.services.stored("ci", "build-storage").is_some());
    assert_eq!(
        server.service_host().unwrap(),
        "build-storage.ci.svc.cluster.local"
    );
}

#[tokio::test]
async fn create_twice_yields_same_three_objects() {
    let fx = Fixture::new();
    let mut first = fx.server();
    first.create().await.unwrap();
    let endpoint = first.endpoint().unwrap();

    let mut second = fx.server();
    second.create().await.unwrap();

    assert_eq!(fx.secrets.objects().len(), 1);
    assert_eq!(fx.deployments.objects().len(), 1);
    assert_eq!(fx.services.objects().len(), 1);
    // Credentials come from the existing secret, not a fresh token
    assert_eq!(second.endpoint().unwrap(), endpoint);
}

#[tokio::test]
async fn host_before_create_is_an_error() {
    let fx = Fixture::new();
    let server = fx.server();

    assert!(matches!(
        server.service_host(),
        Err(StorageServerError::NotCreated(name)) if name == "build-storage"
    ));
    assert!(server.storage_config("build").is_err());
}

#[tokio::test]
async fn create_propagates_other_errors() {
    let fx = Fixture::new();
    fx.deployments
        .fail_next(ApiVerb::Create, ApiError::Unavailable("down".to_string()));
    let mut server = fx.server();

    assert!(matches!(
        server.create().await,
        Err(StorageServerError::Api(ApiError::Unavailable(_)))
    ));
    assert!(fx.services.objects().is_empty());
}

#[tokio::test]
async fn wait_reports_ready_deployment() {
    let fx = Fixture::ready_on_create();
    let mut server = fx.server();
    server.create().await.unwrap();

    let result = server
        .wait_for_availability(Duration::from_secs(1), CancellationToken::new())
        .await
        .unwrap();

    assert!(result.is_ok());
}

#[tokio::test]
async fn wait_sees_replica_become_ready() {
    let fx = Fixture::new();
    let mut server = fx.server();
    server.create().await.unwrap();
    let rx = server.wait_for_availability(Duration::from_secs(1), CancellationToken::new());

    tokio::time::sleep(Duration::from_millis(20)).await;
    fx.deployments
        .modify("ci", "build-storage", |d| d.status.ready_replicas = 1);

    assert!(rx.await.unwrap().is_ok());
}

#[tokio::test]
async fn wait_times_out() {
    let fx = Fixture::new();
    let mut server = fx.server();
    server.create().await.unwrap();

    let result = server
        .wait_for_availability(Duration::from_millis(30), CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(result, Err(StorageServerError::Unavailable { .. })));
}

#[tokio::test]
async fn wait_stops_on_cancel() {
    let fx = Fixture::new();
    let mut server = fx.server();
    server.create().await.unwrap();
    let cancel = CancellationToken::new();
    let rx = server.wait_for_availability(Duration::from_secs(10), cancel.clone());

    cancel.cancel();

    assert!(matches!(
        rx.await.unwrap(),
        Err(StorageServerError::Cancelled(_))
    ));
}

#[tokio::test]
async fn delete_is_idempotent() {
    let fx = Fixture::new();
    let mut server = fx.server();
    server.create().await.unwrap();

    server.delete().await.unwrap();
    server.delete().await.unwrap();

    assert!(fx.secrets.objects().is_empty());
    assert!(fx.deployments.objects().is_empty());
    assert!(fx.services.objects().is_empty());
    assert_eq!(fx.services.calls_of(ApiVerb::Delete).len(), 2);
}

#[tokio::test]
async fn storage_config_points_at_service() {
    let fx = Fixture::new();
    let mut server = fx.server();
    server.create().await.unwrap();

    let config = server.storage_config("artifacts").unwrap();

    assert_eq!(config.s3.host, "build-storage.ci.svc.cluster.local");
    assert_eq!(config.s3.port, 9000);
    assert_eq!(config.s3.bucket_name, "artifacts");
    assert_eq!(config.s3.credentials.secret.name, "build-storage");
    assert_eq!(config.s3.credentials.secret.access_key_key, ACCESS_KEY);
}
