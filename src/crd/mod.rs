//! # Custom Resource Definitions
//!
//! CRD types for the Certificate Controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `Certificate` CRD specification, issuer reference and default values
//! - `status.rs` - Status types: issuance window, serial number and conditions

mod spec;
mod status;

// Re-export all public types
pub use spec::{
    default_duration, default_false, default_renew_before, Certificate, CertificateSpec,
    IssuerKind, IssuerRef,
};
pub use status::{
    CertificateStatus, Condition, ConditionStatus, Conditions, CONDITION_AVAILABLE,
    CONDITION_READY, REASON_CERTIFICATE_ISSUED, REASON_GENERATION_FAILED, REASON_RECONCILING,
    REASON_SECRET_UPDATE_FAILED,
};
