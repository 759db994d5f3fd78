//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_BACKOFF_MAX_MINUTES, DEFAULT_BACKOFF_MIN_MINUTES, DEFAULT_METRICS_PORT,
    DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS, DEFAULT_SERVER_POLL_INTERVAL_MS,
    DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Controller-level configuration
///
/// All settings have defaults and can be overridden via environment variables,
/// usually populated from a ConfigMap with `envFrom` in the Deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// HTTP port for `/metrics`, `/healthz` and `/readyz` (METRICS_PORT)
    pub metrics_port: u16,
    /// Requeue used when the backoff state cannot be read (RECONCILIATION_ERROR_REQUEUE_SECS)
    pub reconciliation_error_requeue_secs: u64,
    /// Fibonacci backoff floor for failed reconciliations (BACKOFF_MIN_MINUTES)
    pub backoff_min_minutes: u64,
    /// Fibonacci backoff cap for failed reconciliations (BACKOFF_MAX_MINUTES)
    pub backoff_max_minutes: u64,
    /// Default log level when RUST_LOG is unset (LOG_LEVEL)
    pub log_level: String,
    /// `json` or `text` (LOG_FORMAT)
    pub log_format: String,
    /// Namespace to watch; empty watches all namespaces (WATCH_NAMESPACE)
    pub watch_namespace: Option<String>,
    /// How long to wait for the HTTP server to come up (SERVER_STARTUP_TIMEOUT_SECS)
    pub server_startup_timeout_secs: u64,
    /// Readiness poll interval during server startup (SERVER_POLL_INTERVAL_MS)
    pub server_poll_interval_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            reconciliation_error_requeue_secs: DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            backoff_min_minutes: DEFAULT_BACKOFF_MIN_MINUTES,
            backoff_max_minutes: DEFAULT_BACKOFF_MAX_MINUTES,
            log_level: "info".to_string(),
            log_format: "json".to_string(),
            watch_namespace: None,
            server_startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            server_poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Unparsable values are reported with a warning and replaced by the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let backoff_min_minutes = parse_or_default(
            &lookup,
            "BACKOFF_MIN_MINUTES",
            defaults.backoff_min_minutes,
        );
        let mut backoff_max_minutes = parse_or_default(
            &lookup,
            "BACKOFF_MAX_MINUTES",
            defaults.backoff_max_minutes,
        );
        if backoff_max_minutes < backoff_min_minutes {
            warn!(
                "BACKOFF_MAX_MINUTES ({}) is below BACKOFF_MIN_MINUTES ({}), using {}",
                backoff_max_minutes, backoff_min_minutes, backoff_min_minutes
            );
            backoff_max_minutes = backoff_min_minutes;
        }

        let log_format = match lookup("LOG_FORMAT").map(|v| v.trim().to_lowercase()) {
            None => defaults.log_format,
            Some(format) if format == "json" || format == "text" => format,
            Some(other) => {
                warn!("Invalid LOG_FORMAT '{}', using 'json'", other);
                defaults.log_format
            }
        };

        Self {
            metrics_port: parse_or_default(&lookup, "METRICS_PORT", defaults.metrics_port),
            reconciliation_error_requeue_secs: parse_or_default(
                &lookup,
                "RECONCILIATION_ERROR_REQUEUE_SECS",
                defaults.reconciliation_error_requeue_secs,
            ),
            backoff_min_minutes,
            backoff_max_minutes,
            log_level: lookup("LOG_LEVEL")
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.log_level),
            log_format,
            watch_namespace: lookup("WATCH_NAMESPACE")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            server_startup_timeout_secs: parse_or_default(
                &lookup,
                "SERVER_STARTUP_TIMEOUT_SECS",
                defaults.server_startup_timeout_secs,
            ),
            server_poll_interval_ms: parse_or_default(
                &lookup,
                "SERVER_POLL_INTERVAL_MS",
                defaults.server_poll_interval_ms,
            ),
        }
    }

    #[must_use]
    pub fn reconciliation_error_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.reconciliation_error_requeue_secs)
    }

    #[must_use]
    pub fn server_startup_timeout(&self) -> Duration {
        Duration::from_secs(self.server_startup_timeout_secs)
    }

    #[must_use]
    pub fn server_poll_interval(&self) -> Duration {
        Duration::from_millis(self.server_poll_interval_ms)
    }

    #[must_use]
    pub fn json_logs(&self) -> bool {
        self.log_format == "json"
    }
}

fn parse_or_default<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Invalid value '{}' for {}, using default {}", raw, key, default);
            default
        }),
    }
}
