//! # Memory Store
//!
//! In-process [`ObjectStore`] with API-server-like write semantics:
//!
//! - every write bumps a store-wide `resourceVersion`
//! - an update carrying a stale `resourceVersion` is a conflict
//! - certificate updates never touch status and status updates never touch the rest
//! - a deleting certificate whose last finalizer is removed disappears
//!
//! Writes are counted and failures can be injected per operation, which is
//! what the reconciliation tests build on.

use super::{namespaced_name, object_key, ObjectStore, StoreError};
use crate::crd::Certificate;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Secret;
use kube::Resource;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Store operations that can have failures injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetCertificate,
    UpdateCertificate,
    UpdateCertificateStatus,
    GetSecret,
    CreateSecret,
    UpdateSecret,
    ListDeployments,
    UpdateDeployment,
}

/// Number of successful writes per kind of write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub certificate_updates: usize,
    pub status_updates: usize,
    pub secret_creates: usize,
    pub secret_updates: usize,
    pub deployment_updates: usize,
}

impl WriteCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.certificate_updates
            + self.status_updates
            + self.secret_creates
            + self.secret_updates
            + self.deployment_updates
    }
}

type Key = (String, String);

#[derive(Default)]
struct State {
    certificates: BTreeMap<Key, Certificate>,
    secrets: BTreeMap<Key, Secret>,
    deployments: BTreeMap<Key, Deployment>,
    revision: u64,
    writes: WriteCounts,
    injected_conflicts: HashMap<Operation, usize>,
    injected_failures: HashMap<Operation, usize>,
}

impl State {
    fn next_revision(&mut self) -> String {
        self.revision += 1;
        self.revision.to_string()
    }

    /// Consume one injected failure or conflict for `op`, if any is pending
    fn take_injected(
        &mut self,
        op: Operation,
        kind: &'static str,
        namespace: &str,
        name: &str,
    ) -> Result<(), StoreError> {
        if take_one(&mut self.injected_failures, op) {
            return Err(StoreError::Api(kube::Error::Api(kube::error::ErrorResponse {
                status: "Failure".to_string(),
                message: format!("injected failure for {op:?}"),
                reason: "InternalError".to_string(),
                code: 500,
            })));
        }
        if take_one(&mut self.injected_conflicts, op) {
            return Err(StoreError::Conflict {
                kind,
                key: object_key(namespace, name),
            });
        }
        Ok(())
    }

    /// Stamp identity fields the API server would assign on create
    fn stamp_new<K: Resource>(&mut self, obj: &mut K) {
        let revision = self.next_revision();
        let meta = obj.meta_mut();
        if meta.uid.is_none() {
            meta.uid = Some(format!("uid-{revision}"));
        }
        meta.resource_version = Some(revision);
    }
}

fn take_one(pending: &mut HashMap<Operation, usize>, op: Operation) -> bool {
    match pending.get_mut(&op) {
        Some(count) if *count > 0 => {
            *count -= 1;
            true
        }
        _ => false,
    }
}

/// Reject `incoming` when it carries a resourceVersion different from the stored one
fn check_version<K: Resource>(
    stored: &K,
    incoming: &K,
    kind: &'static str,
    namespace: &str,
    name: &str,
) -> Result<(), StoreError> {
    match &incoming.meta().resource_version {
        Some(version) if Some(version) != stored.meta().resource_version.as_ref() => {
            Err(StoreError::Conflict {
                kind,
                key: object_key(namespace, name),
            })
        }
        _ => Ok(()),
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("MemoryStore")
            .field("certificates", &state.certificates.len())
            .field("secrets", &state.secrets.len())
            .field("deployments", &state.deployments.len())
            .field("writes", &state.writes)
            .finish()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a certificate without counting a write
    pub fn insert_certificate(&self, mut certificate: Certificate) -> Result<Certificate, StoreError> {
        let key = namespaced_name(&certificate)?;
        let mut state = self.state();
        state.stamp_new(&mut certificate);
        state.certificates.insert(key, certificate.clone());
        Ok(certificate)
    }

    /// Seed a secret without counting a write
    pub fn insert_secret(&self, mut secret: Secret) -> Result<Secret, StoreError> {
        let key = namespaced_name(&secret)?;
        let mut state = self.state();
        state.stamp_new(&mut secret);
        state.secrets.insert(key, secret.clone());
        Ok(secret)
    }

    /// Seed a deployment without counting a write
    pub fn insert_deployment(&self, mut deployment: Deployment) -> Result<Deployment, StoreError> {
        let key = namespaced_name(&deployment)?;
        let mut state = self.state();
        state.stamp_new(&mut deployment);
        state.deployments.insert(key, deployment.clone());
        Ok(deployment)
    }

    /// Request deletion of a certificate the way the API server does it
    ///
    /// With finalizers present the object only gets a deletion timestamp.
    /// Without finalizers it is removed immediately.
    pub fn delete_certificate(
        &self,
        namespace: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let timestamp =
            serde_json::from_value(serde_json::json!(now.to_rfc3339_opts(SecondsFormat::Secs, true)))?;

        let mut state = self.state();
        let key = (namespace.to_string(), name.to_string());
        let Some(mut certificate) = state.certificates.remove(&key) else {
            return Err(StoreError::NotFound {
                kind: "Certificate",
                key: object_key(namespace, name),
            });
        };

        if certificate
            .metadata
            .finalizers
            .as_ref()
            .is_some_and(|f| !f.is_empty())
        {
            certificate.metadata.deletion_timestamp = Some(timestamp);
            certificate.metadata.resource_version = Some(state.next_revision());
            state.certificates.insert(key, certificate);
        }
        Ok(())
    }

    /// Fail the next `count` calls of `op` with a conflict
    pub fn inject_conflicts(&self, op: Operation, count: usize) {
        *self.state().injected_conflicts.entry(op).or_default() += count;
    }

    /// Fail the next `count` calls of `op` with a server error
    pub fn inject_failures(&self, op: Operation, count: usize) {
        *self.state().injected_failures.entry(op).or_default() += count;
    }

    #[must_use]
    pub fn writes(&self) -> WriteCounts {
        self.state().writes
    }

    #[must_use]
    pub fn certificate(&self, namespace: &str, name: &str) -> Option<Certificate> {
        self.state()
            .certificates
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    #[must_use]
    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.state()
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    #[must_use]
    pub fn deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.state()
            .deployments
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_certificate(&self, namespace: &str, name: &str) -> Result<Certificate, StoreError> {
        let mut state = self.state();
        state.take_injected(Operation::GetCertificate, "Certificate", namespace, name)?;
        state
            .certificates
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "Certificate",
                key: object_key(namespace, name),
            })
    }

    async fn update_certificate(&self, certificate: &Certificate) -> Result<Certificate, StoreError> {
        let (namespace, name) = namespaced_name(certificate)?;
        let mut state = self.state();
        state.take_injected(Operation::UpdateCertificate, "Certificate", &namespace, &name)?;

        let key = (namespace.clone(), name.clone());
        let stored = state.certificates.get(&key).ok_or_else(|| StoreError::NotFound {
            kind: "Certificate",
            key: object_key(&namespace, &name),
        })?;
        check_version(stored, certificate, "Certificate", &namespace, &name)?;

        let mut updated = certificate.clone();
        updated.status = stored.status.clone();
        updated.metadata.uid = stored.metadata.uid.clone();
        updated.metadata.resource_version = Some(state.next_revision());
        state.writes.certificate_updates += 1;

        let finalizers_empty = updated
            .metadata
            .finalizers
            .as_ref()
            .is_none_or(Vec::is_empty);
        if updated.metadata.deletion_timestamp.is_some() && finalizers_empty {
            state.certificates.remove(&key);
        } else {
            state.certificates.insert(key, updated.clone());
        }
        Ok(updated)
    }

    async fn update_certificate_status(
        &self,
        certificate: &Certificate,
    ) -> Result<Certificate, StoreError> {
        let (namespace, name) = namespaced_name(certificate)?;
        let mut state = self.state();
        state.take_injected(
            Operation::UpdateCertificateStatus,
            "Certificate",
            &namespace,
            &name,
        )?;

        let key = (namespace.clone(), name.clone());
        let stored = state.certificates.get(&key).ok_or_else(|| StoreError::NotFound {
            kind: "Certificate",
            key: object_key(&namespace, &name),
        })?;
        check_version(stored, certificate, "Certificate", &namespace, &name)?;

        let mut updated = stored.clone();
        updated.status = certificate.status.clone();
        updated.metadata.resource_version = Some(state.next_revision());
        state.writes.status_updates += 1;
        state.certificates.insert(key, updated.clone());
        Ok(updated)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, StoreError> {
        let mut state = self.state();
        state.take_injected(Operation::GetSecret, "Secret", namespace, name)?;
        state
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "Secret",
                key: object_key(namespace, name),
            })
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let (namespace, name) = namespaced_name(secret)?;
        let mut state = self.state();
        state.take_injected(Operation::CreateSecret, "Secret", &namespace, &name)?;

        let key = (namespace.clone(), name.clone());
        if state.secrets.contains_key(&key) {
            return Err(StoreError::Conflict {
                kind: "Secret",
                key: object_key(&namespace, &name),
            });
        }

        let mut created = secret.clone();
        created.metadata.uid = None;
        state.stamp_new(&mut created);
        state.writes.secret_creates += 1;
        state.secrets.insert(key, created.clone());
        Ok(created)
    }

    async fn update_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let (namespace, name) = namespaced_name(secret)?;
        let mut state = self.state();
        state.take_injected(Operation::UpdateSecret, "Secret", &namespace, &name)?;

        let key = (namespace.clone(), name.clone());
        let stored = state.secrets.get(&key).ok_or_else(|| StoreError::NotFound {
            kind: "Secret",
            key: object_key(&namespace, &name),
        })?;
        check_version(stored, secret, "Secret", &namespace, &name)?;

        let mut updated = secret.clone();
        updated.metadata.uid = stored.metadata.uid.clone();
        updated.metadata.resource_version = Some(state.next_revision());
        state.writes.secret_updates += 1;
        state.secrets.insert(key, updated.clone());
        Ok(updated)
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, StoreError> {
        let mut state = self.state();
        state.take_injected(Operation::ListDeployments, "Deployment", namespace, "")?;
        Ok(state
            .deployments
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, deployment)| deployment.clone())
            .collect())
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<Deployment, StoreError> {
        let (namespace, name) = namespaced_name(deployment)?;
        let mut state = self.state();
        state.take_injected(Operation::UpdateDeployment, "Deployment", &namespace, &name)?;

        let key = (namespace.clone(), name.clone());
        let stored = state
            .deployments
            .get(&key)
            .ok_or_else(|| StoreError::NotFound {
                kind: "Deployment",
                key: object_key(&namespace, &name),
            })?;
        check_version(stored, deployment, "Deployment", &namespace, &name)?;

        let mut updated = deployment.clone();
        updated.metadata.uid = stored.metadata.uid.clone();
        updated.metadata.resource_version = Some(state.next_revision());
        state.writes.deployment_updates += 1;
        state.deployments.insert(key, updated.clone());
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;

    fn secret(name: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..ObjectMeta::default()
            },
            ..Secret::default()
        }
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let store = MemoryStore::new();
        let created = store.create_secret(&secret("tls")).await.unwrap();
        assert!(created.metadata.uid.is_some());
        assert!(created.metadata.resource_version.is_some());

        let fetched = store.get_secret("default", "tls").await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(store.writes().secret_creates, 1);
    }

    #[tokio::test]
    async fn test_create_existing_is_conflict() {
        let store = MemoryStore::new();
        store.insert_secret(secret("tls")).unwrap();
        let err = store.create_secret(&secret("tls")).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.writes().total(), 0);
    }

    #[tokio::test]
    async fn test_stale_resource_version_is_conflict() {
        let store = MemoryStore::new();
        let original = store.insert_secret(secret("tls")).unwrap();

        let mut first = original.clone();
        first.metadata.labels = Some(BTreeMap::from([("a".to_string(), "1".to_string())]));
        store.update_secret(&first).await.unwrap();

        // Second writer still holds the original version
        let err = store.update_secret(&original).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.writes().secret_updates, 1);
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let store = MemoryStore::new();
        assert!(store.get_secret("default", "nope").await.unwrap_err().is_not_found());
        assert!(store
            .get_certificate("default", "nope")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let store = MemoryStore::new();
        store.insert_secret(secret("tls")).unwrap();
        store.inject_conflicts(Operation::GetSecret, 1);
        store.inject_failures(Operation::GetSecret, 1);

        assert!(matches!(
            store.get_secret("default", "tls").await,
            Err(StoreError::Api(_))
        ));
        assert!(store.get_secret("default", "tls").await.unwrap_err().is_conflict());
        assert!(store.get_secret("default", "tls").await.is_ok());
    }

    #[tokio::test]
    async fn test_list_deployments_is_namespace_scoped() {
        let store = MemoryStore::new();
        for (ns, name) in [("default", "a"), ("default", "b"), ("other", "c")] {
            store
                .insert_deployment(Deployment {
                    metadata: ObjectMeta {
                        name: Some(name.to_string()),
                        namespace: Some(ns.to_string()),
                        ..ObjectMeta::default()
                    },
                    ..Deployment::default()
                })
                .unwrap();
        }

        let listed = store.list_deployments("default").await.unwrap();
        let names: Vec<_> = listed
            .iter()
            .filter_map(|d| d.metadata.name.clone())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
