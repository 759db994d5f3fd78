//! # Dependent Workload Restart
//!
//! Rolls Deployments that consume a TLS secret so their pods pick up the new
//! certificate. A Deployment is rolled by stamping a pod-template annotation,
//! which changes the template hash and starts a rolling update.

use crate::constants::{MAX_CONFLICT_RETRIES, RESTARTED_AT_ANNOTATION};
use crate::store::{ObjectStore, StoreError};
use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, PodSpec};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum WorkloadUpdateError {
    #[error("failed to list deployments in namespace {namespace}: {source}")]
    List {
        namespace: String,
        #[source]
        source: StoreError,
    },
}

/// Result of one restart pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestartSummary {
    /// Number of Deployments whose template was stamped
    pub restarted: usize,
    /// Deployments that reference the secret but could not be updated
    pub failed: Vec<String>,
}

/// Stamp `restartedAt = now` on every Deployment in `namespace` that uses `secret_name`
///
/// Per-Deployment write failures are logged and collected in the summary.
/// Only failing to list Deployments is an error.
pub async fn restart_dependent_workloads(
    store: &dyn ObjectStore,
    namespace: &str,
    secret_name: &str,
    now: DateTime<Utc>,
) -> Result<RestartSummary, WorkloadUpdateError> {
    let deployments = list(store, namespace).await?;
    let stamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);

    let mut summary = RestartSummary::default();
    for deployment in deployments
        .into_iter()
        .filter(|d| deployment_uses_secret(d, secret_name))
    {
        let name = deployment.metadata.name.clone().unwrap_or_default();
        info!("Restarting deployment {}/{} to pick up secret {}", namespace, name, secret_name);

        match stamp_with_retry(store, namespace, deployment, &stamp).await {
            Ok(()) => summary.restarted += 1,
            Err(e) => {
                warn!("Failed to restart deployment {}/{}: {}", namespace, name, e);
                summary.failed.push(name);
            }
        }
    }

    info!(
        "Deployment restart completed for secret {}/{}: {} restarted, {} failed",
        namespace,
        secret_name,
        summary.restarted,
        summary.failed.len()
    );
    Ok(summary)
}

/// True when any volume, `envFrom` or `env.valueFrom` in the pod template references `secret_name`
#[must_use]
pub fn deployment_uses_secret(deployment: &Deployment, secret_name: &str) -> bool {
    deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.template.spec.as_ref())
        .is_some_and(|pod| pod_uses_secret(pod, secret_name))
}

fn pod_uses_secret(pod: &PodSpec, secret_name: &str) -> bool {
    let volume_match = pod.volumes.iter().flatten().any(|volume| {
        volume
            .secret
            .as_ref()
            .and_then(|s| s.secret_name.as_deref())
            == Some(secret_name)
    });

    volume_match
        || pod
            .containers
            .iter()
            .chain(pod.init_containers.iter().flatten())
            .any(|container| container_uses_secret(container, secret_name))
}

fn container_uses_secret(container: &Container, secret_name: &str) -> bool {
    let env_from = container
        .env_from
        .iter()
        .flatten()
        .filter_map(|source| source.secret_ref.as_ref())
        .any(|secret_ref| secret_ref.name == secret_name);

    let env = container
        .env
        .iter()
        .flatten()
        .filter_map(|var| var.value_from.as_ref())
        .filter_map(|value_from| value_from.secret_key_ref.as_ref())
        .any(|key_ref| key_ref.name == secret_name);

    env_from || env
}

async fn list(store: &dyn ObjectStore, namespace: &str) -> Result<Vec<Deployment>, WorkloadUpdateError> {
    store
        .list_deployments(namespace)
        .await
        .map_err(|source| WorkloadUpdateError::List {
            namespace: namespace.to_string(),
            source,
        })
}

/// Write the annotation, re-reading the Deployment after a conflict
async fn stamp_with_retry(
    store: &dyn ObjectStore,
    namespace: &str,
    mut deployment: Deployment,
    stamp: &str,
) -> Result<(), StoreError> {
    let name = deployment.metadata.name.clone().unwrap_or_default();
    let mut attempt = 0;

    loop {
        set_restarted_at(&mut deployment, stamp);
        match store.update_deployment(&deployment).await {
            Ok(_) => return Ok(()),
            Err(e) if e.is_conflict() && attempt < MAX_CONFLICT_RETRIES => {
                attempt += 1;
                debug!(
                    "Conflict restarting deployment {}/{} (retry {}/{})",
                    namespace, name, attempt, MAX_CONFLICT_RETRIES
                );
                deployment = store
                    .list_deployments(namespace)
                    .await?
                    .into_iter()
                    .find(|d| d.metadata.name.as_deref() == Some(name.as_str()))
                    .ok_or_else(|| StoreError::NotFound {
                        kind: "Deployment",
                        key: crate::store::object_key(namespace, &name),
                    })?;
            }
            Err(e) => return Err(e),
        }
    }
}

fn set_restarted_at(deployment: &mut Deployment, stamp: &str) {
    let spec = deployment.spec.get_or_insert_with(Default::default);
    spec.template
        .metadata
        .get_or_insert_with(Default::default)
        .annotations
        .get_or_insert_with(Default::default)
        .insert(RESTARTED_AT_ANNOTATION.to_string(), stamp.to_string());
}
