//! # Issuers
//!
//! Certificate issuance backends.
//!
//! The issuer is selected by `spec.issuerRef.kind`:
//! - `SelfSigned` - fresh key pair, certificate signed by its own key
//! - `CA` / `External` - not implemented, issuance fails with `UnsupportedIssuer`

use crate::controller::reconciler::validation::DurationError;
use crate::crd::{CertificateSpec, IssuerKind};
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

pub mod self_signed;

/// Output of one successful issuance
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    /// PEM-encoded certificate
    pub certificate_pem: String,
    /// PEM-encoded private key
    pub private_key_pem: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Serial number, lowercase hex without leading zeros
    pub serial_number: String,
}

impl fmt::Debug for IssuedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCertificate")
            .field("serial_number", &self.serial_number)
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .field("private_key_pem", &"***")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid duration: {0}")]
    InvalidDuration(#[from] DurationError),
    #[error("validity window starting at {not_before} cannot be represented")]
    ValidityOutOfRange { not_before: DateTime<Utc> },
    #[error("issuer kind {0} is not supported")]
    UnsupportedIssuer(IssuerKind),
    #[error("invalid DNS subject alternative name '{name}': {source}")]
    InvalidSubjectAltName {
        name: String,
        #[source]
        source: rcgen::Error,
    },
    #[error("failed to generate private key: {0}")]
    KeyGeneration(#[source] rcgen::Error),
    #[error("failed to create certificate: {0}")]
    Signing(#[source] rcgen::Error),
}

impl GenerationError {
    /// Short label used for metrics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::InvalidDuration(_) | GenerationError::ValidityOutOfRange { .. } => {
                "invalid_duration"
            }
            GenerationError::UnsupportedIssuer(_) => "unsupported_issuer",
            GenerationError::InvalidSubjectAltName { .. } => "invalid_san",
            GenerationError::KeyGeneration(_) => "key_generation",
            GenerationError::Signing(_) => "signing",
        }
    }
}

/// Issue a certificate for `spec` using the issuer named by its `issuerRef.kind`
pub fn issue(spec: &CertificateSpec, now: DateTime<Utc>) -> Result<IssuedCertificate, GenerationError> {
    match spec.issuer_ref.kind {
        IssuerKind::SelfSigned => self_signed::generate(spec, now),
        kind @ (IssuerKind::Ca | IssuerKind::External) => {
            Err(GenerationError::UnsupportedIssuer(kind))
        }
    }
}
