//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Name used as field manager and in the managed-by label
pub const CONTROLLER_NAME: &str = "certificate-controller";

/// Finalizer placed on every Certificate the controller has seen
pub const CERTIFICATE_FINALIZER: &str = "cert.octopilot.io/finalizer";

/// Label linking a Secret back to the Certificate that owns it
pub const CERTIFICATE_LABEL: &str = "cert.octopilot.io/certificate";

/// Standard managed-by label key
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Pod-template annotation stamped on dependent Deployments to roll them
pub const RESTARTED_AT_ANNOTATION: &str = "cert.octopilot.io/restartedAt";

/// Secret data key holding the PEM certificate
pub const TLS_CERT_KEY: &str = "tls.crt";

/// Secret data key holding the PEM private key
pub const TLS_KEY_KEY: &str = "tls.key";

/// Secret type for TLS material
pub const TLS_SECRET_TYPE: &str = "kubernetes.io/tls";

/// Organization written into every issued certificate subject
pub const CERTIFICATE_ORGANIZATION: &str = "Certificate Operator";

/// Validity used when `spec.duration` is empty (90 days)
pub const DEFAULT_CERTIFICATE_DURATION: &str = "2160h";

/// Renewal lead time used when `spec.renewBefore` is empty or unparsable (30 days)
pub const DEFAULT_RENEW_BEFORE: &str = "720h";

/// Short requeue used before first issuance and when renewal is overdue (seconds)
pub const SHORT_REQUEUE_SECS: u64 = 60;

/// Headroom kept ahead of the renewal time when scheduling the next wake-up (seconds)
pub const RENEWAL_HEADROOM_SECS: u64 = 3600;

/// How many times a conflicting write is re-read and re-applied
pub const MAX_CONFLICT_RETRIES: usize = 3;

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default requeue interval for reconciliation errors (seconds)
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 60;

/// Default Fibonacci backoff floor for failed reconciliations (minutes)
pub const DEFAULT_BACKOFF_MIN_MINUTES: u64 = 1;

/// Default Fibonacci backoff ceiling for failed reconciliations (minutes)
pub const DEFAULT_BACKOFF_MAX_MINUTES: u64 = 10;
