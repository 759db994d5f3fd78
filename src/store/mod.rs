//! # Object Store
//!
//! Read/write access to the objects the controller touches.
//!
//! The reconciler never talks to the API server directly. It goes through an
//! injected [`ObjectStore`] so the same code runs against a live cluster
//! ([`KubeStore`]) and against an in-process store ([`MemoryStore`]).
//!
//! Every update carries the object's `resourceVersion`; a stale version fails
//! with [`StoreError::Conflict`] and the caller decides whether to re-read.

use crate::crd::Certificate;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Secret;
use kube::Resource;
use thiserror::Error;

mod kube_store;
mod memory;

pub use kube_store::KubeStore;
pub use memory::{MemoryStore, Operation, WriteCounts};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: String },
    #[error("{kind} {key} was modified concurrently")]
    Conflict { kind: &'static str, key: String },
    #[error("Kubernetes API error: {0}")]
    Api(#[source] kube::Error),
    #[error("failed to serialize object: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("object is missing metadata.{0}")]
    MissingMetadata(&'static str),
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    /// Classify a kube error for the object `namespace/name`
    pub(crate) fn from_kube(err: kube::Error, kind: &'static str, namespace: &str, name: &str) -> Self {
        match err {
            kube::Error::Api(api_err) if api_err.code == 404 => StoreError::NotFound {
                kind,
                key: object_key(namespace, name),
            },
            kube::Error::Api(api_err) if api_err.code == 409 => StoreError::Conflict {
                kind,
                key: object_key(namespace, name),
            },
            other => StoreError::Api(other),
        }
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_certificate(&self, namespace: &str, name: &str) -> Result<Certificate, StoreError>;

    /// Replace metadata and spec. Status is left untouched.
    async fn update_certificate(&self, certificate: &Certificate) -> Result<Certificate, StoreError>;

    /// Replace the status subresource only
    async fn update_certificate_status(
        &self,
        certificate: &Certificate,
    ) -> Result<Certificate, StoreError>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, StoreError>;

    /// Create a secret; an existing secret of the same name is a conflict
    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;

    async fn update_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, StoreError>;

    async fn update_deployment(&self, deployment: &Deployment) -> Result<Deployment, StoreError>;
}

/// `namespace/name` key used in logs, errors and backoff tracking
#[must_use]
pub fn object_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

/// Namespace and name of a namespaced object
pub fn namespaced_name<K: Resource>(obj: &K) -> Result<(String, String), StoreError> {
    let meta = obj.meta();
    let name = meta.name.clone().ok_or(StoreError::MissingMetadata("name"))?;
    let namespace = meta
        .namespace
        .clone()
        .ok_or(StoreError::MissingMetadata("namespace"))?;
    Ok((namespace, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "test".to_string(),
            reason: "Test".to_string(),
            code,
        })
    }

    #[test]
    fn test_from_kube_classifies_status_codes() {
        assert!(StoreError::from_kube(api_error(404), "Secret", "ns", "a").is_not_found());
        assert!(StoreError::from_kube(api_error(409), "Secret", "ns", "a").is_conflict());
        assert!(matches!(
            StoreError::from_kube(api_error(500), "Secret", "ns", "a"),
            StoreError::Api(_)
        ));
    }

    #[test]
    fn test_not_found_message_names_object() {
        let err = StoreError::from_kube(api_error(404), "Certificate", "default", "web");
        assert_eq!(err.to_string(), "Certificate default/web not found");
    }

    #[test]
    fn test_namespaced_name_requires_metadata() {
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some("tls".to_string()),
                ..ObjectMeta::default()
            },
            ..Secret::default()
        };
        assert!(matches!(
            namespaced_name(&secret),
            Err(StoreError::MissingMetadata("namespace"))
        ));
    }
}
