//! # Watch Loop
//!
//! Runs the kube-runtime `Controller` for Certificates.
//!
//! Secrets are watched as owned objects, so deleting or editing a TLS secret
//! triggers a reconciliation of the Certificate that owns it.

use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::Certificate;
use crate::runtime::error_policy::handle_reconciliation_error;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Run the controller until SIGINT/SIGTERM
///
/// In-flight reconciliations finish before this returns. Readiness is
/// dropped as soon as the stream ends so no new traffic is routed here.
pub async fn run_watch_loop(
    certificates: Api<Certificate>,
    secrets: Api<Secret>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let watch_span = tracing::span!(
        tracing::Level::INFO,
        "controller.watch",
        operation = "watch_loop"
    );

    info!("Starting controller watch loop...");
    Controller::new(certificates, watcher::Config::default().any_semantic())
        .owns(secrets, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, handle_reconciliation_error, reconciler)
        .for_each(|result| async move {
            match result {
                Ok((object, action)) => {
                    debug!("Reconciled {}: {:?}", object, action);
                }
                Err(e) => {
                    warn!("Controller stream error: {}", e);
                }
            }
        })
        .instrument(watch_span)
        .await;

    server_state.set_ready(false);
    info!("Controller watch loop stopped, shutting down");
    Ok(())
}
