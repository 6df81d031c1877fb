// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service account, role and binding used by a pipeline's worker pods

use relay_adapters::{Api, ApiError};
use relay_core::{
    labels, ObjectMeta, Pipeline, PolicyRule, Resource, Role, RoleBinding, ServiceAccount,
    Subject,
};

const COMPONENT: &str = "runner";

#[derive(Clone)]
pub struct RbacApis {
    pub service_accounts: Api<ServiceAccount>,
    pub roles: Api<Role>,
    pub role_bindings: Api<RoleBinding>,
}

/// Worker pods read their sibling containers and report job status
fn runner_rules() -> Vec<PolicyRule> {
    let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    vec![
        PolicyRule {
            api_groups: strings(&[""]),
            resources: strings(&["pods"]),
            verbs: strings(&["get", "list", "watch"]),
        },
        PolicyRule {
            api_groups: strings(&["relay.dev"]),
            resources: strings(&["pipelinejobs", "pipelinejobs/status"]),
            verbs: strings(&["get", "patch"]),
        },
    ]
}

/// Name of a pipeline's service account, role and binding
pub fn runner_name(prefix: &str, pipeline: &str) -> String {
    format!("{}{}", prefix, pipeline)
}

/// Per-pipeline runner identity
pub struct RunnerAccess {
    apis: RbacApis,
    name: String,
    namespace: String,
    pipeline: String,
    owner: relay_core::OwnerReference,
}

impl RunnerAccess {
    pub fn for_pipeline(apis: RbacApis, prefix: &str, pipeline: &Pipeline) -> Self {
        Self {
            apis,
            name: runner_name(prefix, pipeline.name()),
            namespace: pipeline.namespace().to_string(),
            pipeline: pipeline.name().to_string(),
            owner: pipeline.controller_reference(),
        }
    }

    /// Name of the service account (and its role and binding)
    pub fn service_account(&self) -> &str {
        &self.name
    }

    fn metadata(&self) -> ObjectMeta {
        ObjectMeta::new(&self.namespace, &self.name)
            .with_label(labels::PIPELINE, &self.pipeline)
            .with_label(labels::COMPONENT, COMPONENT)
            .with_owner(self.owner.clone())
    }

    /// Create whatever is missing
    pub async fn ensure(&self) -> Result<(), ApiError> {
        let account = ServiceAccount {
            metadata: self.metadata(),
        };
        let role = Role {
            metadata: self.metadata(),
            rules: runner_rules(),
        };
        let binding = RoleBinding {
            metadata: self.metadata(),
            role_ref: self.name.clone(),
            subjects: vec![Subject {
                kind: ServiceAccount::KIND.to_string(),
                name: self.name.clone(),
                namespace: self.namespace.clone(),
            }],
        };

        existing_ok(self.apis.service_accounts.create(&account).await)?;
        existing_ok(self.apis.roles.create(&role).await)?;
        existing_ok(self.apis.role_bindings.create(&binding).await)?;
        Ok(())
    }

    /// Delete binding, role and account; missing objects are fine
    pub async fn remove(&self) -> Result<(), ApiError> {
        missing_ok(self.apis.role_bindings.delete(&self.namespace, &self.name).await)?;
        missing_ok(self.apis.roles.delete(&self.namespace, &self.name).await)?;
        missing_ok(self.apis.service_accounts.delete(&self.namespace, &self.name).await)?;
        Ok(())
    }
}

fn existing_ok<K>(result: Result<K, ApiError>) -> Result<(), ApiError> {
    match result {
        Err(e) if !e.is_already_exists() => Err(e),
        _ => Ok(()),
    }
}

fn missing_ok(result: Result<(), ApiError>) -> Result<(), ApiError> {
    match result {
        Err(e) if !e.is_not_found() => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_adapters::FakeResourceApi;
    use relay_core::PipelineSpec;
    use std::sync::Arc;

    struct Fakes {
        accounts: FakeResourceApi<ServiceAccount>,
        roles: FakeResourceApi<Role>,
        bindings: FakeResourceApi<RoleBinding>,
    }

    fn access() -> (Fakes, RunnerAccess) {
        let fakes = Fakes {
            accounts: FakeResourceApi::new(),
            roles: FakeResourceApi::new(),
            bindings: FakeResourceApi::new(),
        };
        let apis = RbacApis {
            service_accounts: Arc::new(fakes.accounts.clone()),
            roles: Arc::new(fakes.roles.clone()),
            role_bindings: Arc::new(fakes.bindings.clone()),
        };
        let pipeline = Pipeline::new(ObjectMeta::new("ci", "build"), PipelineSpec::default());
        let access = RunnerAccess::for_pipeline(apis, "relay-runner-", &pipeline);
        (fakes, access)
    }

    #[tokio::test]
    async fn ensure_is_idempotent() {
        let (fakes, access) = access();

        access.ensure().await.unwrap();
        access.ensure().await.unwrap();

        assert_eq!(access.service_account(), "relay-runner-build");
        assert_eq!(fakes.accounts.objects().len(), 1);
        let binding = fakes.bindings.stored("ci", "relay-runner-build").unwrap();
        assert_eq!(binding.role_ref, "relay-runner-build");
        assert_eq!(binding.subjects[0].kind, "ServiceAccount");
        assert_eq!(fakes.roles.objects()[0].rules.len(), 2);
    }

    #[tokio::test]
    async fn remove_tolerates_missing_objects() {
        let (fakes, access) = access();
        access.ensure().await.unwrap();

        access.remove().await.unwrap();
        access.remove().await.unwrap();

        assert!(fakes.accounts.objects().is_empty());
        assert!(fakes.roles.objects().is_empty());
        assert!(fakes.bindings.objects().is_empty());
    }
}
