//! Rolling Deployments that consume the TLS secret

mod common;

use certificate_controller::controller::reconciler::{
    reconcile_certificate, restart_dependent_workloads, WorkloadUpdateError,
};
use certificate_controller::store::{MemoryStore, Operation};
use common::{
    deployment, mounting_deployment, now, restarted_at, setup, spec, unrelated_deployment,
    CERTIFICATE_NAME, NAMESPACE, SECRET_NAME,
};

fn env_from_deployment(name: &str) -> k8s_openapi::api::apps::v1::Deployment {
    deployment(
        name,
        serde_json::json!({
            "containers": [{
                "name": "app",
                "image": "nginx",
                "envFrom": [{ "secretRef": { "name": SECRET_NAME } }]
            }]
        }),
    )
}

#[tokio::test]
async fn test_only_referencing_deployments_are_restarted() {
    let store = MemoryStore::new();
    store.insert_deployment(mounting_deployment("frontend", SECRET_NAME)).unwrap();
    store.insert_deployment(env_from_deployment("worker")).unwrap();
    store.insert_deployment(unrelated_deployment("cache")).unwrap();

    let summary = restart_dependent_workloads(&store, NAMESPACE, SECRET_NAME, now())
        .await
        .unwrap();

    assert_eq!(summary.restarted, 2);
    assert!(summary.failed.is_empty());
    let stamp = Some("2025-03-01T08:00:00Z".to_string());
    assert_eq!(restarted_at(&store.deployment(NAMESPACE, "frontend").unwrap()), stamp);
    assert_eq!(restarted_at(&store.deployment(NAMESPACE, "worker").unwrap()), stamp);
    assert_eq!(restarted_at(&store.deployment(NAMESPACE, "cache").unwrap()), None);
    assert_eq!(store.writes().deployment_updates, 2);
}

#[tokio::test]
async fn test_other_namespaces_are_ignored() {
    let store = MemoryStore::new();
    let mut elsewhere = mounting_deployment("frontend", SECRET_NAME);
    elsewhere.metadata.namespace = Some("other".to_string());
    store.insert_deployment(elsewhere).unwrap();

    let summary = restart_dependent_workloads(&store, NAMESPACE, SECRET_NAME, now())
        .await
        .unwrap();

    assert_eq!(summary.restarted, 0);
    assert_eq!(store.writes().total(), 0);
}

#[tokio::test]
async fn test_failed_update_does_not_stop_the_rest() {
    let store = MemoryStore::new();
    store.insert_deployment(mounting_deployment("a-frontend", SECRET_NAME)).unwrap();
    store.insert_deployment(mounting_deployment("b-frontend", SECRET_NAME)).unwrap();
    store.inject_failures(Operation::UpdateDeployment, 1);

    let summary = restart_dependent_workloads(&store, NAMESPACE, SECRET_NAME, now())
        .await
        .unwrap();

    assert_eq!(summary.restarted, 1);
    assert_eq!(summary.failed, vec!["a-frontend".to_string()]);
    assert!(restarted_at(&store.deployment(NAMESPACE, "b-frontend").unwrap()).is_some());
}

#[tokio::test]
async fn test_conflicting_update_is_retried() {
    let store = MemoryStore::new();
    store.insert_deployment(mounting_deployment("frontend", SECRET_NAME)).unwrap();
    store.inject_conflicts(Operation::UpdateDeployment, 1);

    let summary = restart_dependent_workloads(&store, NAMESPACE, SECRET_NAME, now())
        .await
        .unwrap();

    assert_eq!(summary.restarted, 1);
    assert_eq!(store.writes().deployment_updates, 1);
}

#[tokio::test]
async fn test_list_failure_is_an_error() {
    let store = MemoryStore::new();
    store.inject_failures(Operation::ListDeployments, 1);

    let err = restart_dependent_workloads(&store, NAMESPACE, SECRET_NAME, now())
        .await
        .unwrap_err();

    assert!(matches!(err, WorkloadUpdateError::List { .. }));
}

#[tokio::test]
async fn test_issuance_restarts_dependents_when_enabled() {
    let (store, reconciler) = setup(spec(serde_json::json!({ "restartDeployments": true })));
    store.insert_deployment(mounting_deployment("frontend", SECRET_NAME)).unwrap();
    store.insert_deployment(unrelated_deployment("cache")).unwrap();

    reconcile_certificate(&reconciler, NAMESPACE, CERTIFICATE_NAME, now())
        .await
        .unwrap();

    assert!(restarted_at(&store.deployment(NAMESPACE, "frontend").unwrap()).is_some());
    assert!(restarted_at(&store.deployment(NAMESPACE, "cache").unwrap()).is_none());
}

#[tokio::test]
async fn test_issuance_leaves_dependents_alone_by_default() {
    let (store, reconciler) = setup(spec(serde_json::json!({})));
    store.insert_deployment(mounting_deployment("frontend", SECRET_NAME)).unwrap();

    reconcile_certificate(&reconciler, NAMESPACE, CERTIFICATE_NAME, now())
        .await
        .unwrap();

    assert!(restarted_at(&store.deployment(NAMESPACE, "frontend").unwrap()).is_none());
    assert_eq!(store.writes().deployment_updates, 0);
}

#[tokio::test]
async fn test_restart_failure_does_not_fail_reconciliation() {
    let (store, reconciler) = setup(spec(serde_json::json!({ "restartDeployments": true })));
    store.insert_deployment(mounting_deployment("frontend", SECRET_NAME)).unwrap();
    store.inject_failures(Operation::ListDeployments, 1);

    let result = reconcile_certificate(&reconciler, NAMESPACE, CERTIFICATE_NAME, now()).await;

    assert!(result.is_ok());
    assert!(store.secret(NAMESPACE, SECRET_NAME).is_some());
}
