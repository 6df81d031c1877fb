// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-pipeline object-storage server
//!
//! Each running pipeline gets a credentials secret, a single-replica
//! deployment and a cluster-local service, all named `{pipeline}-storage`.
//! They are created in that order and deleted in reverse.

use crate::config::StorageServerConfig;
use relay_adapters::{Api, ApiError, S3Endpoint};
use relay_core::{
    labels, CredentialsSecretRef, Deployment, DeploymentSpec, IdGen, ObjectMeta, OwnerReference,
    Pipeline, Resource, S3Config, S3Credentials, Secret, Service, ServiceSpec, StorageConfig,
};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Key of the access key in the credentials secret
pub const ACCESS_KEY: &str = "accessKey";
/// Key of the secret key in the credentials secret
pub const SECRET_KEY: &str = "secretKey";

const COMPONENT: &str = "storage";

#[derive(Debug, Error)]
pub enum StorageServerError {
    #[error("storage server {0} not yet created")]
    NotCreated(String),
    #[error("credentials secret {0} lacks accessKey/secretKey")]
    MissingCredentials(String),
    #[error("storage server {name} not available after {timeout:?}")]
    Unavailable { name: String, timeout: Duration },
    #[error("wait for storage server {0} cancelled")]
    Cancelled(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Cluster APIs the storage server is made of
#[derive(Clone)]
pub struct StorageApis {
    pub secrets: Api<Secret>,
    pub deployments: Api<Deployment>,
    pub services: Api<Service>,
}

#[derive(Debug, Clone)]
struct Created {
    host: String,
    access_key: String,
    secret_key: String,
}

pub struct StorageServer<I: IdGen> {
    apis: StorageApis,
    config: StorageServerConfig,
    ids: I,
    namespace: String,
    pipeline: String,
    owner: OwnerReference,
    created: Option<Created>,
}

impl<I: IdGen> StorageServer<I> {
    pub fn for_pipeline(
        apis: StorageApis,
        config: StorageServerConfig,
        ids: I,
        pipeline: &Pipeline,
    ) -> Self {
        Self {
            apis,
            config,
            ids,
            namespace: pipeline.namespace().to_string(),
            pipeline: pipeline.name().to_string(),
            owner: pipeline.controller_reference(),
            created: None,
        }
    }

    /// Name shared by the secret, deployment and service
    pub fn name(&self) -> String {
        format!("{}-storage", self.pipeline)
    }

    fn selector(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (labels::PIPELINE.to_string(), self.pipeline.clone()),
            (labels::COMPONENT.to_string(), COMPONENT.to_string()),
        ])
    }

    fn metadata(&self) -> ObjectMeta {
        let mut meta =
            ObjectMeta::new(&self.namespace, self.name()).with_owner(self.owner.clone());
        meta.labels = self.selector();
        meta
    }

    /// Ensure the secret, deployment and service exist
    ///
    /// Existing objects count as success; an existing secret's credentials
    /// are reused.
    pub async fn create(&mut self) -> Result<(), StorageServerError> {
        let name = self.name();

        let secret = Secret {
            metadata: self.metadata(),
            string_data: BTreeMap::from([
                (ACCESS_KEY.to_string(), self.ids.token()),
                (SECRET_KEY.to_string(), self.ids.token()),
            ]),
        };
        let secret = match self.apis.secrets.create(&secret).await {
            Ok(created) => created,
            Err(e) if e.is_already_exists() => {
                self.apis.secrets.get(&self.namespace, &name).await?
            }
            Err(e) => return Err(e.into()),
        };
        let (Some(access_key), Some(secret_key)) = (
            secret.string_data.get(ACCESS_KEY),
            secret.string_data.get(SECRET_KEY),
        ) else {
            return Err(StorageServerError::MissingCredentials(name));
        };

        let deployment = Deployment {
            metadata: self.metadata(),
            spec: DeploymentSpec {
                replicas: 1,
                selector: self.selector(),
                image: self.config.image.clone(),
                args: vec!["server".to_string(), "/data".to_string()],
                env_from_secret: Some(name.clone()),
                port: self.config.port,
            },
            ..Deployment::default()
        };
        tolerate_existing(self.apis.deployments.create(&deployment).await)?;

        let service = Service {
            metadata: self.metadata(),
            spec: ServiceSpec {
                selector: self.selector(),
                port: self.config.port,
                target_port: self.config.port,
            },
        };
        tolerate_existing(self.apis.services.create(&service).await)?;

        tracing::debug!(pipeline = %self.pipeline, storage = %name, "storage server ensured");
        self.created = Some(Created {
            host: service.host(),
            access_key: access_key.clone(),
            secret_key: secret_key.clone(),
        });
        Ok(())
    }

    /// Poll the deployment until one replica is ready or `deadline` passes
    ///
    /// The result arrives once on the returned channel.
    pub fn wait_for_availability(
        &self,
        deadline: Duration,
        cancel: CancellationToken,
    ) -> oneshot::Receiver<Result<(), StorageServerError>> {
        let (tx, rx) = oneshot::channel();
        let deployments = self.apis.deployments.clone();
        let namespace = self.namespace.clone();
        let name = self.name();
        let poll = self.config.poll_interval;

        tokio::spawn(async move {
            let result = poll_ready(deployments, &namespace, &name, deadline, poll, cancel).await;
            // Receiver may have given up
            let _ = tx.send(result);
        });
        rx
    }

    /// Remove service, deployment and secret; missing objects are fine
    pub async fn delete(&self) -> Result<(), StorageServerError> {
        let name = self.name();
        tolerate_missing(self.apis.services.delete(&self.namespace, &name).await)?;
        tolerate_missing(self.apis.deployments.delete(&self.namespace, &name).await)?;
        tolerate_missing(self.apis.secrets.delete(&self.namespace, &name).await)?;
        Ok(())
    }

    pub fn service_host(&self) -> Result<&str, StorageServerError> {
        self.created
            .as_ref()
            .map(|c| c.host.as_str())
            .ok_or_else(|| StorageServerError::NotCreated(self.name()))
    }

    /// Client endpoint using the generated credentials
    pub fn endpoint(&self) -> Result<S3Endpoint, StorageServerError> {
        let created = self
            .created
            .as_ref()
            .ok_or_else(|| StorageServerError::NotCreated(self.name()))?;
        Ok(S3Endpoint {
            host: created.host.clone(),
            port: self.config.port,
            use_ssl: false,
            access_key: created.access_key.clone(),
            secret_key: created.secret_key.clone(),
        })
    }

    /// Workspace storage settings pointing jobs at this server
    pub fn storage_config(&self, bucket: &str) -> Result<StorageConfig, StorageServerError> {
        Ok(StorageConfig {
            s3: S3Config {
                host: self.service_host()?.to_string(),
                port: self.config.port,
                use_ssl: false,
                bucket_name: bucket.to_string(),
                credentials: S3Credentials {
                    secret: CredentialsSecretRef {
                        name: self.name(),
                        access_key_key: ACCESS_KEY.to_string(),
                        secret_key_key: SECRET_KEY.to_string(),
                    },
                },
            },
        })
    }
}

fn tolerate_existing<K>(result: Result<K, ApiError>) -> Result<(), ApiError> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.is_already_exists() => Ok(()),
        Err(e) => Err(e),
    }
}

fn tolerate_missing(result: Result<(), ApiError>) -> Result<(), ApiError> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

async fn poll_ready(
    deployments: Api<Deployment>,
    namespace: &str,
    name: &str,
    deadline: Duration,
    poll: Duration,
    cancel: CancellationToken,
) -> Result<(), StorageServerError> {
    let until = Instant::now() + deadline;
    loop {
        match deployments.get(namespace, name).await {
            Ok(d) if d.status.ready_replicas >= 1 => return Ok(()),
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let now = Instant::now();
        if now >= until {
            return Err(StorageServerError::Unavailable {
                name: name.to_string(),
                timeout: deadline,
            });
        }
        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(StorageServerError::Cancelled(name.to_string()));
            }
            _ = tokio::time::sleep(poll.min(until - now)) => {}
        }
    }
}

#[cfg(test)]
#[path = "storage_server_tests.rs"]
mod tests;
