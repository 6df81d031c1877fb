// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory cluster for reconciler tests
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::context::Clients;
use relay_adapters::{FakeObjectStore, FakeResourceApi};
use relay_core::{
    Deployment, Pipeline, PipelineJob, PipelineStage, Role, RoleBinding, Secret, Service,
    ServiceAccount, Workload,
};
use std::sync::Arc;

/// One fake API per kind; deployments report ready as soon as created
#[derive(Clone)]
pub struct FakeClients {
    pub pipelines: FakeResourceApi<Pipeline>,
    pub stages: FakeResourceApi<PipelineStage>,
    pub jobs: FakeResourceApi<PipelineJob>,
    pub workloads: FakeResourceApi<Workload>,
    pub secrets: FakeResourceApi<Secret>,
    pub deployments: FakeResourceApi<Deployment>,
    pub services: FakeResourceApi<Service>,
    pub service_accounts: FakeResourceApi<ServiceAccount>,
    pub roles: FakeResourceApi<Role>,
    pub role_bindings: FakeResourceApi<RoleBinding>,
    pub object_store: FakeObjectStore,
}

impl FakeClients {
    pub fn new() -> Self {
        Self {
            pipelines: FakeResourceApi::new(),
            stages: FakeResourceApi::new(),
            jobs: FakeResourceApi::new(),
            workloads: FakeResourceApi::new(),
            secrets: FakeResourceApi::new(),
            deployments: FakeResourceApi::new()
                .with_create_hook(|d: &mut Deployment| d.status.ready_replicas = d.spec.replicas),
            services: FakeResourceApi::new(),
            service_accounts: FakeResourceApi::new(),
            roles: FakeResourceApi::new(),
            role_bindings: FakeResourceApi::new(),
            object_store: FakeObjectStore::new(),
        }
    }

    pub fn clients(&self) -> Clients {
        Clients {
            pipelines: Arc::new(self.pipelines.clone()),
            stages: Arc::new(self.stages.clone()),
            jobs: Arc::new(self.jobs.clone()),
            workloads: Arc::new(self.workloads.clone()),
            secrets: Arc::new(self.secrets.clone()),
            deployments: Arc::new(self.deployments.clone()),
            services: Arc::new(self.services.clone()),
            service_accounts: Arc::new(self.service_accounts.clone()),
            roles: Arc::new(self.roles.clone()),
            role_bindings: Arc::new(self.role_bindings.clone()),
            object_store: Arc::new(self.object_store.clone()),
        }
    }
}

impl Default for FakeClients {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) use captured::with_tracing;

#[cfg(test)]
mod captured {
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct CapturedLogs {
        logs: Arc<Mutex<Vec<u8>>>,
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.logs.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Run a future on a fresh runtime, returning its debug-level log output
    pub(crate) fn with_tracing<F, Fut>(f: F) -> (String, Fut::Output)
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future,
    {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(logs.clone())
            .with_ansi(false)
            .without_time()
            .finish();

        let result = tracing::subscriber::with_default(subscriber, || {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap()
                .block_on(f())
        });

        let contents = String::from_utf8_lossy(&logs.logs.lock().unwrap()).to_string();
        (contents, result)
    }
}
