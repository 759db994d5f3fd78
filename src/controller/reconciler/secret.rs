//! # TLS Secret Synchronization
//!
//! Writes issued certificate material into the Certificate's TLS Secret.
//!
//! - Absent secret: created with the managed labels, `kubernetes.io/tls` type
//!   and a controller owner reference to the Certificate
//! - Present secret: `data` and `labels` are replaced in place; identity,
//!   annotations, type and existing owner references are preserved
//! - Secret already matching: no write at all
//!
//! A conflicting write is retried from a fresh read, up to `MAX_CONFLICT_RETRIES` times.

use crate::constants::{
    CERTIFICATE_LABEL, CONTROLLER_NAME, MANAGED_BY_LABEL, MAX_CONFLICT_RETRIES, TLS_CERT_KEY,
    TLS_KEY_KEY, TLS_SECRET_TYPE,
};
use crate::crd::Certificate;
use crate::store::{namespaced_name, object_key, ObjectStore, StoreError};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::Resource;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

/// What a sync did to the secret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Updated,
    Unchanged,
}

impl SyncOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOutcome::Created => "created",
            SyncOutcome::Updated => "updated",
            SyncOutcome::Unchanged => "unchanged",
        }
    }
}

#[derive(Debug, Error)]
pub enum SecretSyncError {
    #[error("failed to sync secret {key}: {source}")]
    Store {
        key: String,
        #[source]
        source: StoreError,
    },
    #[error("secret {key} kept conflicting after {attempts} attempts")]
    ConflictRetriesExhausted { key: String, attempts: usize },
}

/// Create or update the TLS secret named by `certificate.spec.secretName`
pub async fn sync_tls_secret(
    store: &dyn ObjectStore,
    certificate: &Certificate,
    certificate_pem: &str,
    private_key_pem: &str,
) -> Result<SyncOutcome, SecretSyncError> {
    let secret_name = certificate.spec.secret_name.as_str();
    let (namespace, certificate_name) =
        namespaced_name(certificate).map_err(|source| SecretSyncError::Store {
            key: secret_name.to_string(),
            source,
        })?;
    let key = object_key(&namespace, secret_name);

    let owner = certificate
        .controller_owner_ref(&())
        .ok_or_else(|| SecretSyncError::Store {
            key: key.clone(),
            source: StoreError::MissingMetadata("uid"),
        })?;
    let data = tls_data(certificate_pem, private_key_pem);
    let labels = managed_labels(&certificate_name);

    let attempts = MAX_CONFLICT_RETRIES + 1;
    for attempt in 1..=attempts {
        let result = match store.get_secret(&namespace, secret_name).await {
            Err(e) if e.is_not_found() => {
                let secret = Secret {
                    metadata: ObjectMeta {
                        name: Some(secret_name.to_string()),
                        namespace: Some(namespace.clone()),
                        labels: Some(labels.clone()),
                        owner_references: Some(vec![owner.clone()]),
                        ..ObjectMeta::default()
                    },
                    type_: Some(TLS_SECRET_TYPE.to_string()),
                    data: Some(data.clone()),
                    ..Secret::default()
                };
                store
                    .create_secret(&secret)
                    .await
                    .map(|_| SyncOutcome::Created)
            }
            Err(source) => {
                return Err(SecretSyncError::Store { key, source });
            }
            Ok(existing) => {
                if secret_matches(&existing, &data, &labels, &owner) {
                    debug!("Secret {} already up to date", key);
                    return Ok(SyncOutcome::Unchanged);
                }
                let updated = apply_tls_material(existing, &data, &labels, &owner);
                store
                    .update_secret(&updated)
                    .await
                    .map(|_| SyncOutcome::Updated)
            }
        };

        match result {
            Ok(outcome) => {
                info!("Secret {} {}", key, outcome.as_str());
                return Ok(outcome);
            }
            Err(e) if e.is_conflict() => {
                debug!(
                    "Conflict writing secret {} (attempt {}/{}), re-reading",
                    key, attempt, attempts
                );
            }
            Err(source) => return Err(SecretSyncError::Store { key, source }),
        }
    }

    Err(SecretSyncError::ConflictRetriesExhausted { key, attempts })
}

/// Labels every managed secret carries
#[must_use]
pub fn managed_labels(certificate_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (MANAGED_BY_LABEL.to_string(), CONTROLLER_NAME.to_string()),
        (CERTIFICATE_LABEL.to_string(), certificate_name.to_string()),
    ])
}

fn tls_data(certificate_pem: &str, private_key_pem: &str) -> BTreeMap<String, ByteString> {
    BTreeMap::from([
        (
            TLS_CERT_KEY.to_string(),
            ByteString(certificate_pem.as_bytes().to_vec()),
        ),
        (
            TLS_KEY_KEY.to_string(),
            ByteString(private_key_pem.as_bytes().to_vec()),
        ),
    ])
}

fn has_owner(secret: &Secret, owner: &OwnerReference) -> bool {
    secret
        .metadata
        .owner_references
        .as_ref()
        .is_some_and(|refs| refs.iter().any(|r| r.uid == owner.uid))
}

fn secret_matches(
    existing: &Secret,
    data: &BTreeMap<String, ByteString>,
    labels: &BTreeMap<String, String>,
    owner: &OwnerReference,
) -> bool {
    existing.data.as_ref() == Some(data)
        && existing.metadata.labels.as_ref() == Some(labels)
        && has_owner(existing, owner)
}

fn apply_tls_material(
    mut secret: Secret,
    data: &BTreeMap<String, ByteString>,
    labels: &BTreeMap<String, String>,
    owner: &OwnerReference,
) -> Secret {
    secret.data = Some(data.clone());
    secret.metadata.labels = Some(labels.clone());

    // Adopt the secret only when no other controller claims it
    let refs = secret.metadata.owner_references.get_or_insert_with(Vec::new);
    let claimed = refs
        .iter()
        .any(|r| r.uid == owner.uid || r.controller == Some(true));
    if !claimed {
        refs.push(owner.clone());
    }
    secret
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(uid: &str, controller: bool) -> OwnerReference {
        OwnerReference {
            api_version: "cert.octopilot.io/v1alpha1".to_string(),
            kind: "Certificate".to_string(),
            name: "web".to_string(),
            uid: uid.to_string(),
            controller: Some(controller),
            block_owner_deletion: Some(true),
        }
    }

    #[test]
    fn test_managed_labels() {
        let labels = managed_labels("web");
        assert_eq!(labels[MANAGED_BY_LABEL], "certificate-controller");
        assert_eq!(labels[CERTIFICATE_LABEL], "web");
    }

    #[test]
    fn test_apply_replaces_data_and_labels_only() {
        let mut existing = Secret::default();
        existing.metadata.annotations =
            Some(BTreeMap::from([("keep".to_string(), "me".to_string())]));
        existing.metadata.labels = Some(BTreeMap::from([("old".to_string(), "x".to_string())]));
        existing.data = Some(BTreeMap::from([(
            "ca.crt".to_string(),
            ByteString(b"old".to_vec()),
        )]));
        existing.type_ = Some("Opaque".to_string());

        let data = tls_data("CERT", "KEY");
        let labels = managed_labels("web");
        let updated = apply_tls_material(existing, &data, &labels, &owner("u1", true));

        assert_eq!(updated.data.as_ref(), Some(&data));
        assert_eq!(updated.metadata.labels.as_ref(), Some(&labels));
        assert_eq!(
            updated.metadata.annotations.unwrap()["keep"],
            "me".to_string()
        );
        assert_eq!(updated.type_.as_deref(), Some("Opaque"));
        assert_eq!(updated.metadata.owner_references.unwrap().len(), 1);
    }

    #[test]
    fn test_apply_does_not_steal_foreign_controller() {
        let mut existing = Secret::default();
        existing.metadata.owner_references = Some(vec![owner("other", true)]);

        let updated = apply_tls_material(
            existing,
            &tls_data("C", "K"),
            &managed_labels("web"),
            &owner("u1", true),
        );
        let refs = updated.metadata.owner_references.unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].uid, "other");
    }

    #[test]
    fn test_secret_matches_requires_owner() {
        let data = tls_data("C", "K");
        let labels = managed_labels("web");
        let mut secret = Secret {
            data: Some(data.clone()),
            ..Secret::default()
        };
        secret.metadata.labels = Some(labels.clone());

        assert!(!secret_matches(&secret, &data, &labels, &owner("u1", true)));
        secret.metadata.owner_references = Some(vec![owner("u1", true)]);
        assert!(secret_matches(&secret, &data, &labels, &owner("u1", true)));
        assert!(!secret_matches(
            &secret,
            &tls_data("C2", "K"),
            &labels,
            &owner("u1", true)
        ));
    }
}
