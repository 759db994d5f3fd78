//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `certificate_controller_reconciliations_total` - Total number of reconciliations
//! - `certificate_controller_reconciliation_errors_total` - Total number of failed reconciliations
//! - `certificate_controller_reconciliation_duration_seconds` - Duration of reconciliations
//! - `certificate_controller_certificates_issued_total` - Certificates issued
//! - `certificate_controller_issuance_failures_total{reason}` - Failed issuances by reason
//! - `certificate_controller_secret_syncs_total{outcome}` - Secret syncs by outcome
//! - `certificate_controller_workload_restarts_total` - Deployments restarted
//! - `certificate_controller_workload_restart_failures_total` - Deployments that could not be restarted
//! - `certificate_controller_requeues_total{reason}` - Requeues by reason

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "certificate_controller_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "certificate_controller_reconciliation_errors_total",
        "Total number of reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "certificate_controller_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static CERTIFICATES_ISSUED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "certificate_controller_certificates_issued_total",
        "Total number of certificates issued",
    )
    .expect("Failed to create CERTIFICATES_ISSUED_TOTAL metric - this should never happen")
});

static ISSUANCE_FAILURES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "certificate_controller_issuance_failures_total",
            "Total number of failed certificate issuances by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create ISSUANCE_FAILURES_TOTAL metric - this should never happen")
});

static SECRET_SYNCS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "certificate_controller_secret_syncs_total",
            "Total number of TLS secret syncs by outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create SECRET_SYNCS_TOTAL metric - this should never happen")
});

static WORKLOAD_RESTARTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "certificate_controller_workload_restarts_total",
        "Total number of deployments restarted after issuance",
    )
    .expect("Failed to create WORKLOAD_RESTARTS_TOTAL metric - this should never happen")
});

static WORKLOAD_RESTART_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "certificate_controller_workload_restart_failures_total",
        "Total number of deployments that could not be restarted",
    )
    .expect("Failed to create WORKLOAD_RESTART_FAILURES_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "certificate_controller_requeues_total",
            "Total number of requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(CERTIFICATES_ISSUED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ISSUANCE_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRET_SYNCS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WORKLOAD_RESTARTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WORKLOAD_RESTART_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_certificates_issued() {
    CERTIFICATES_ISSUED_TOTAL.inc();
}

pub fn increment_issuance_failures(reason: &str) {
    ISSUANCE_FAILURES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_secret_syncs(outcome: &str) {
    SECRET_SYNCS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn increment_workload_restarts(count: usize) {
    WORKLOAD_RESTARTS_TOTAL.inc_by(count as u64);
}

pub fn increment_workload_restart_failures(count: usize) {
    WORKLOAD_RESTART_FAILURES_TOTAL.inc_by(count as u64);
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}
