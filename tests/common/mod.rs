//! Shared fixtures for the integration tests
//!
//! Everything runs against `MemoryStore`; no cluster is needed.

#![allow(dead_code, reason = "not every test binary uses every fixture")]

use certificate_controller::config::ControllerConfig;
use certificate_controller::controller::reconciler::Reconciler;
use certificate_controller::crd::{Certificate, CertificateSpec};
use certificate_controller::store::{MemoryStore, ObjectStore};
use chrono::{DateTime, TimeZone, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use std::sync::Arc;

pub const NAMESPACE: &str = "apps";
pub const CERTIFICATE_NAME: &str = "web";
pub const SECRET_NAME: &str = "web-tls";

/// A fixed point in time so renewal arithmetic is predictable
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
}

pub fn spec(extra: serde_json::Value) -> CertificateSpec {
    let mut value = serde_json::json!({
        "commonName": "web.apps.svc",
        "dnsNames": ["web.apps.svc", "web.apps.svc.cluster.local"],
        "ipAddresses": ["10.0.0.12"],
        "secretName": SECRET_NAME,
    });
    if let (Some(base), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
        for (key, field) in extra {
            base.insert(key.clone(), field.clone());
        }
    }
    serde_json::from_value(value).unwrap()
}

pub fn certificate(spec: CertificateSpec) -> Certificate {
    let mut certificate = Certificate::new(CERTIFICATE_NAME, spec);
    certificate.metadata.namespace = Some(NAMESPACE.to_string());
    certificate
}

/// Deployment in `NAMESPACE` whose pod spec is given as JSON
pub fn deployment(name: &str, pod_spec: serde_json::Value) -> Deployment {
    serde_json::from_value(serde_json::json!({
        "metadata": { "name": name, "namespace": NAMESPACE },
        "spec": {
            "selector": { "matchLabels": { "app": name } },
            "template": {
                "metadata": { "labels": { "app": name } },
                "spec": pod_spec
            }
        }
    }))
    .unwrap()
}

pub fn mounting_deployment(name: &str, secret_name: &str) -> Deployment {
    deployment(
        name,
        serde_json::json!({
            "containers": [{
                "name": "app",
                "image": "nginx",
                "volumeMounts": [{ "name": "tls", "mountPath": "/etc/tls" }]
            }],
            "volumes": [{ "name": "tls", "secret": { "secretName": secret_name } }]
        }),
    )
}

pub fn unrelated_deployment(name: &str) -> Deployment {
    deployment(
        name,
        serde_json::json!({
            "containers": [{ "name": "app", "image": "busybox" }]
        }),
    )
}

/// Store seeded with one Certificate plus a reconciler over it
pub fn setup(spec: CertificateSpec) -> (Arc<MemoryStore>, Reconciler) {
    let store = Arc::new(MemoryStore::new());
    store.insert_certificate(certificate(spec)).unwrap();
    let reconciler = Reconciler::new(
        Arc::clone(&store) as Arc<dyn ObjectStore>,
        ControllerConfig::default(),
    );
    (store, reconciler)
}

pub fn restarted_at(deployment: &Deployment) -> Option<String> {
    deployment
        .spec
        .as_ref()?
        .template
        .metadata
        .as_ref()?
        .annotations
        .as_ref()?
        .get(certificate_controller::constants::RESTARTED_AT_ANNOTATION)
        .cloned()
}
