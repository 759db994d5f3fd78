//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::reconciler::secret::SecretSyncError;
use crate::issuer::GenerationError;
use crate::store::{ObjectStore, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("certificate generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    SecretSync(#[from] SecretSyncError),
    #[error("object store error: {0}")]
    Store(#[from] StoreError),
    #[error("Certificate is missing metadata.{0}")]
    MissingMetadata(&'static str),
}

impl ReconcilerError {
    /// Short label used in logs and metrics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcilerError::Generation(_) => "generation",
            ReconcilerError::SecretSync(_) => "secret_sync",
            ReconcilerError::Store(_) => "store",
            ReconcilerError::MissingMetadata(_) => "missing_metadata",
        }
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_minutes, max_minutes),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Shared reconciliation context
///
/// Holds no cached resource state. The only in-memory state is the
/// per-resource error backoff, keyed by `namespace/name`.
#[derive(Clone)]
pub struct Reconciler {
    pub store: Arc<dyn ObjectStore>,
    pub config: Arc<ControllerConfig>,
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, config: ControllerConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record a failure for `resource_key` and return the delay before the next attempt
    pub fn next_error_backoff(&self, resource_key: &str) -> (std::time::Duration, u32) {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let state = states.entry(resource_key.to_string()).or_insert_with(|| {
            BackoffState::new(self.config.backoff_min_minutes, self.config.backoff_max_minutes)
        });
        state.increment_error();
        (state.backoff.next_backoff(), state.error_count)
    }

    /// Clear the backoff for `resource_key`; returns true when it had recorded errors
    pub fn reset_backoff(&self, resource_key: &str) -> bool {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match states.get_mut(resource_key) {
            Some(state) => {
                let had_errors = state.error_count > 0;
                state.reset();
                had_errors
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn reconciler() -> Reconciler {
        Reconciler::new(Arc::new(MemoryStore::new()), ControllerConfig::default())
    }

    #[test]
    fn test_backoff_is_per_resource() {
        let ctx = reconciler();
        assert_eq!(ctx.next_error_backoff("default/a"), (Duration::from_secs(60), 1));
        assert_eq!(ctx.next_error_backoff("default/a"), (Duration::from_secs(60), 2));
        assert_eq!(ctx.next_error_backoff("default/a"), (Duration::from_secs(120), 3));
        assert_eq!(ctx.next_error_backoff("default/b"), (Duration::from_secs(60), 1));
    }

    #[test]
    fn test_reset_backoff() {
        let ctx = reconciler();
        assert!(!ctx.reset_backoff("default/a"));

        ctx.next_error_backoff("default/a");
        ctx.next_error_backoff("default/a");
        assert!(ctx.reset_backoff("default/a"));
        assert!(!ctx.reset_backoff("default/a"));
        assert_eq!(ctx.next_error_backoff("default/a"), (Duration::from_secs(60), 1));
    }

    #[test]
    fn test_error_kind_labels() {
        let err = ReconcilerError::MissingMetadata("name");
        assert_eq!(err.kind(), "missing_metadata");
        assert_eq!(err.to_string(), "Certificate is missing metadata.name");
    }
}
