//! Certificate Controller Library
//!
//! Kubernetes controller that issues self-signed TLS certificates for
//! `Certificate` custom resources, stores them in `kubernetes.io/tls`
//! Secrets and renews them before they expire.
//!
//! ## Quick Start
//!
//! ```rust
//! use certificate_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod issuer;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod store;
