//! # Certificate Reconciliation
//!
//! One pass of the control loop for a single Certificate:
//!
//! 1. Load the Certificate; gone means done
//! 2. Deleting: release the finalizer and stop
//! 3. Add the finalizer if missing and carry on with the persisted object
//! 4. Not yet due for renewal: requeue
//! 5. Issue a new certificate
//! 6. Write it into the TLS secret
//! 7. Record the issuance in status, then optionally roll dependent Deployments
//! 8. Requeue ahead of the next renewal
//!
//! Failures in 5 and 6 mark `Ready=False` best-effort and are returned so the
//! error policy schedules a retry.

pub mod finalize;

use crate::controller::reconciler::renewal::{
    compute_renewal_time, compute_requeue_delay, needs_renewal,
};
use crate::controller::reconciler::restart::restart_dependent_workloads;
use crate::controller::reconciler::secret::sync_tls_secret;
use crate::controller::reconciler::status::{record_failure, record_issuance};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::{Certificate, REASON_GENERATION_FAILED, REASON_SECRET_UPDATE_FAILED};
use crate::issuer;
use crate::observability::metrics;
use crate::store::object_key;
use chrono::{DateTime, Utc};
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

/// Entry point used by the kube-runtime `Controller`
///
/// The watched object only provides the identity. State is always re-read
/// from the store.
pub async fn reconcile(
    certificate: Arc<Certificate>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let name = certificate
        .metadata
        .name
        .clone()
        .ok_or(ReconcilerError::MissingMetadata("name"))?;
    let namespace = certificate
        .metadata
        .namespace
        .clone()
        .ok_or(ReconcilerError::MissingMetadata("namespace"))?;

    let span = tracing::info_span!(
        "controller.reconcile",
        resource.name = name.as_str(),
        resource.namespace = namespace.as_str(),
        resource.kind = "Certificate",
    );

    async move {
        let start = Instant::now();
        metrics::increment_reconciliations();

        let result = reconcile_certificate(&ctx, &namespace, &name, Utc::now()).await;
        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

        match &result {
            Ok(action) => {
                if ctx.reset_backoff(&object_key(&namespace, &name)) {
                    info!("Backoff reset after successful reconciliation");
                }
                debug!(
                    "Reconciliation complete in {:.3}s: {:?}",
                    start.elapsed().as_secs_f64(),
                    action
                );
            }
            Err(e) => {
                error!("Reconciliation failed ({}): {}", e.kind(), e);
            }
        }
        result
    }
    .instrument(span)
    .await
}

/// Reconcile the Certificate `namespace/name` as of `now`
pub async fn reconcile_certificate(
    ctx: &Reconciler,
    namespace: &str,
    name: &str,
    now: DateTime<Utc>,
) -> Result<Action, ReconcilerError> {
    let store = ctx.store.as_ref();

    let mut certificate = match store.get_certificate(namespace, name).await {
        Ok(certificate) => certificate,
        Err(e) if e.is_not_found() => {
            debug!("Certificate {}/{} not found, nothing to do", namespace, name);
            return Ok(Action::await_change());
        }
        Err(e) => return Err(e.into()),
    };

    if certificate.metadata.deletion_timestamp.is_some() {
        finalize::handle_deletion(store, &certificate).await?;
        return Ok(Action::await_change());
    }

    if !finalize::has_finalizer(&certificate) {
        certificate = finalize::add_finalizer(store, certificate).await?;
    }

    if !needs_renewal(certificate.status.as_ref(), now) {
        let renewal_time = certificate.status.as_ref().and_then(|s| s.renewal_time);
        debug!(
            "Certificate {}/{} not due for renewal until {:?}",
            namespace, name, renewal_time
        );
        return Ok(requeue(renewal_time, now, "renewal-scheduled"));
    }

    info!("Certificate {}/{} needs issuance or renewal", namespace, name);
    issue_certificate(ctx, &certificate, namespace, now).await
}

async fn issue_certificate(
    ctx: &Reconciler,
    certificate: &Certificate,
    namespace: &str,
    now: DateTime<Utc>,
) -> Result<Action, ReconcilerError> {
    let store = ctx.store.as_ref();
    let spec = &certificate.spec;

    let issued = match issuer::issue(spec, now) {
        Ok(issued) => issued,
        Err(e) => {
            metrics::increment_issuance_failures(e.kind());
            record_failure(
                store,
                certificate,
                REASON_GENERATION_FAILED,
                &format!("Failed to generate certificate: {e}"),
                now,
            )
            .await;
            return Err(e.into());
        }
    };

    let outcome = match sync_tls_secret(
        store,
        certificate,
        &issued.certificate_pem,
        &issued.private_key_pem,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            metrics::increment_issuance_failures("secret_sync");
            record_failure(
                store,
                certificate,
                REASON_SECRET_UPDATE_FAILED,
                &format!("Failed to update secret: {e}"),
                now,
            )
            .await;
            return Err(e.into());
        }
    };
    metrics::increment_secret_syncs(outcome.as_str());

    let renewal_time = compute_renewal_time(issued.not_after, &spec.renew_before);
    record_issuance(store, certificate, &issued, renewal_time, now).await?;
    metrics::increment_certificates_issued();

    info!(
        "Issued certificate serial={} notAfter={} renewalTime={} into secret {}",
        issued.serial_number,
        issued.not_after.to_rfc3339(),
        renewal_time.to_rfc3339(),
        object_key(namespace, &spec.secret_name)
    );

    if spec.restart_deployments {
        match restart_dependent_workloads(store, namespace, &spec.secret_name, now).await {
            Ok(summary) => {
                metrics::increment_workload_restarts(summary.restarted);
                metrics::increment_workload_restart_failures(summary.failed.len());
                if !summary.failed.is_empty() {
                    warn!(
                        "Could not restart deployments {:?}; they keep the previous certificate until the next renewal",
                        summary.failed
                    );
                }
            }
            Err(e) => warn!("Skipping deployment restarts: {}", e),
        }
    }

    Ok(requeue(Some(renewal_time), now, "renewal-scheduled"))
}

fn requeue(renewal_time: Option<DateTime<Utc>>, now: DateTime<Utc>, reason: &str) -> Action {
    let delay = compute_requeue_delay(renewal_time, now);
    debug!("Next reconciliation in {}s", delay.as_secs());
    metrics::increment_requeues_total(reason);
    Action::requeue(delay)
}
