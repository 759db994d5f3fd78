//! # Kubernetes Store
//!
//! [`ObjectStore`] backed by the API server through `kube::Api`.
//!
//! Updates use `replace` so the server enforces `resourceVersion`. Status is
//! written with a merge patch on the status subresource that carries the
//! object's `resourceVersion`, which gives the same conflict semantics.

use super::{namespaced_name, ObjectStore, StoreError};
use crate::constants::CONTROLLER_NAME;
use crate::crd::Certificate;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use tracing::debug;

#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(CONTROLLER_NAME.to_string()),
            ..PostParams::default()
        }
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get_certificate(&self, namespace: &str, name: &str) -> Result<Certificate, StoreError> {
        let api: Api<Certificate> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map_err(|e| StoreError::from_kube(e, "Certificate", namespace, name))
    }

    async fn update_certificate(&self, certificate: &Certificate) -> Result<Certificate, StoreError> {
        let (namespace, name) = namespaced_name(certificate)?;
        let api: Api<Certificate> = Api::namespaced(self.client.clone(), &namespace);
        api.replace(&name, &Self::post_params(), certificate)
            .await
            .map_err(|e| StoreError::from_kube(e, "Certificate", &namespace, &name))
    }

    async fn update_certificate_status(
        &self,
        certificate: &Certificate,
    ) -> Result<Certificate, StoreError> {
        let (namespace, name) = namespaced_name(certificate)?;
        let api: Api<Certificate> = Api::namespaced(self.client.clone(), &namespace);

        let status = serde_json::to_value(certificate.status.clone().unwrap_or_default())?;
        let patch = serde_json::json!({
            "metadata": {
                "resourceVersion": certificate.metadata.resource_version,
            },
            "status": status,
        });

        debug!("Patching status of Certificate {}/{}", namespace, name);
        api.patch_status(&name, &PatchParams::apply(CONTROLLER_NAME), &Patch::Merge(&patch))
            .await
            .map_err(|e| StoreError::from_kube(e, "Certificate", &namespace, &name))
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map_err(|e| StoreError::from_kube(e, "Secret", namespace, name))
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let (namespace, name) = namespaced_name(secret)?;
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);
        api.create(&Self::post_params(), secret)
            .await
            .map_err(|e| StoreError::from_kube(e, "Secret", &namespace, &name))
    }

    async fn update_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let (namespace, name) = namespaced_name(secret)?;
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);
        api.replace(&name, &Self::post_params(), secret)
            .await
            .map_err(|e| StoreError::from_kube(e, "Secret", &namespace, &name))
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, StoreError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        api.list(&ListParams::default())
            .await
            .map(|list| list.items)
            .map_err(StoreError::Api)
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<Deployment, StoreError> {
        let (namespace, name) = namespaced_name(deployment)?;
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), &namespace);
        api.replace(&name, &Self::post_params(), deployment)
            .await
            .map_err(|e| StoreError::from_kube(e, "Deployment", &namespace, &name))
    }
}
