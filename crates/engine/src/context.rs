// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handles shared by the reconcilers: cluster clients, caches, naming

use crate::rbac::RbacApis;
use crate::storage_server::StorageApis;
use relay_adapters::{Api, ObjectStore, TracedObjectStore, TracedResourceApi};
use relay_core::{
    Deployment, Pipeline, PipelineJob, PipelineStage, Resource, Role, RoleBinding, Secret,
    Service, ServiceAccount, Workload,
};
use relay_storage::ObjectCache;
use std::sync::Arc;

/// One API handle per resource kind plus the object-storage client
#[derive(Clone)]
pub struct Clients {
    pub pipelines: Api<Pipeline>,
    pub stages: Api<PipelineStage>,
    pub jobs: Api<PipelineJob>,
    pub workloads: Api<Workload>,
    pub secrets: Api<Secret>,
    pub deployments: Api<Deployment>,
    pub services: Api<Service>,
    pub service_accounts: Api<ServiceAccount>,
    pub roles: Api<Role>,
    pub role_bindings: Api<RoleBinding>,
    pub object_store: Arc<dyn ObjectStore>,
}

impl Clients {
    /// Wrap every handle so calls are logged with timing
    pub fn traced(self) -> Self {
        Self {
            pipelines: traced(self.pipelines),
            stages: traced(self.stages),
            jobs: traced(self.jobs),
            workloads: traced(self.workloads),
            secrets: traced(self.secrets),
            deployments: traced(self.deployments),
            services: traced(self.services),
            service_accounts: traced(self.service_accounts),
            roles: traced(self.roles),
            role_bindings: traced(self.role_bindings),
            object_store: Arc::new(TracedObjectStore::new(self.object_store)),
        }
    }

    pub fn storage_apis(&self) -> StorageApis {
        StorageApis {
            secrets: Arc::clone(&self.secrets),
            deployments: Arc::clone(&self.deployments),
            services: Arc::clone(&self.services),
        }
    }

    pub fn rbac_apis(&self) -> RbacApis {
        RbacApis {
            service_accounts: Arc::clone(&self.service_accounts),
            roles: Arc::clone(&self.roles),
            role_bindings: Arc::clone(&self.role_bindings),
        }
    }
}

fn traced<K: Resource>(api: Api<K>) -> Api<K> {
    Arc::new(TracedResourceApi::new(api))
}

/// Informer-fed caches, one per watched kind
#[derive(Clone, Default)]
pub struct Caches {
    pub pipelines: ObjectCache<Pipeline>,
    pub stages: ObjectCache<PipelineStage>,
    pub jobs: ObjectCache<PipelineJob>,
    pub workloads: ObjectCache<Workload>,
}

/// Name of the stage object for a 1-based stage index
pub fn stage_object_name(pipeline: &str, index: usize) -> String {
    format!("{}-stage-{}", pipeline, index)
}

/// Name of a job object (and of the workload that runs it)
pub fn job_object_name(stage_object: &str, job: &str) -> String {
    format!("{}-{}", stage_object, job)
}
