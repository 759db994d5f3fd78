//! # Prelude
//!
//! Re-exports commonly used types and traits.
//!
//! ```rust
//! use certificate_controller::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Reconciler types
pub use crate::controller::reconciler::{
    reconcile, reconcile_certificate, BackoffState, Reconciler, ReconcilerError,
};

// Certificate generation
pub use crate::issuer::{issue, GenerationError, IssuedCertificate};

// Object access
pub use crate::store::{KubeStore, MemoryStore, ObjectStore, StoreError};

pub use crate::config::ControllerConfig;
