//! # Error Policy
//!
//! Requeue policy for failed reconciliations.
//!
//! Backoff state is tracked per resource so one failing Certificate does not
//! slow down the others. It is reset by the next successful reconciliation.
//! Objects missing their identity never get better by waiting longer, so they
//! are retried at the fixed `RECONCILIATION_ERROR_REQUEUE_SECS` interval.

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::Certificate;
use crate::observability::metrics;
use crate::store::object_key;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{error, info};

/// Requeue a failed Certificate with Fibonacci backoff
pub fn handle_reconciliation_error(
    obj: Arc<Certificate>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = obj.metadata.namespace.as_deref().unwrap_or("default");

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = name,
        resource.namespace = namespace,
        error.kind = error.kind(),
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}/{}: {}", namespace, name, error);
    metrics::increment_reconciliation_errors();

    if matches!(error, ReconcilerError::MissingMetadata(_)) {
        let delay = ctx.config.reconciliation_error_requeue_duration();
        info!("Retrying in {}s (trigger source: error-fixed)", delay.as_secs());
        metrics::increment_requeues_total("error-fixed");
        return Action::requeue(delay);
    }

    let (delay, error_count) = ctx.next_error_backoff(&object_key(namespace, name));
    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());

    info!(
        "Retrying in {}s (error count: {}, next attempt at {}, trigger source: error-backoff)",
        delay.as_secs(),
        error_count,
        next_trigger_time.to_rfc3339()
    );

    metrics::increment_requeues_total("error-backoff");
    Action::requeue(delay)
}
