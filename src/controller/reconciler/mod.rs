//! # Reconciler
//!
//! Core reconciliation logic for `Certificate` resources.
//!
//! The reconciler:
//! - Keeps a finalizer on every live Certificate
//! - Issues a certificate when none was issued or the renewal time is reached
//! - Writes certificate and key into a `kubernetes.io/tls` Secret owned by the Certificate
//! - Records the issuance in the Certificate status
//! - Optionally rolls Deployments that consume the Secret
//! - Requeues itself ahead of the next renewal

pub mod reconcile;
pub mod renewal;
pub mod restart;
pub mod secret;
pub mod status;
pub mod types;
pub mod validation;

pub use reconcile::{reconcile, reconcile_certificate};
pub use renewal::{compute_renewal_time, compute_requeue_delay, needs_renewal};
pub use restart::{
    deployment_uses_secret, restart_dependent_workloads, RestartSummary, WorkloadUpdateError,
};
pub use secret::{sync_tls_secret, SecretSyncError, SyncOutcome};
pub use types::{BackoffState, Reconciler, ReconcilerError};
