//! # Certificate Spec
//!
//! Main CRD specification types and default values.

use crate::constants::{DEFAULT_CERTIFICATE_DURATION, DEFAULT_RENEW_BEFORE};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Certificate Custom Resource Definition
///
/// Declares a TLS certificate the controller keeps issued into a Secret of the
/// same namespace, renewing it `renewBefore` ahead of expiry.
///
/// # Example
///
/// ```yaml
/// apiVersion: cert.octopilot.io/v1alpha1
/// kind: Certificate
/// metadata:
///   name: myapp
///   namespace: default
/// spec:
///   commonName: myapp.default.svc
///   dnsNames:
///     - myapp.default.svc
///     - myapp.default.svc.cluster.local
///   ipAddresses:
///     - 10.0.0.15
///   secretName: myapp-tls
///   duration: 2160h
///   renewBefore: 720h
///   issuerRef:
///     name: selfsigned
///     kind: SelfSigned
///   restartDeployments: true
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "Certificate",
    group = "cert.octopilot.io",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::CertificateStatus",
    shortname = "cert",
    shortname = "certs",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}, {"name":"Secret", "type":"string", "jsonPath":".spec.secretName"}, {"name":"Issuer", "type":"string", "jsonPath":".spec.issuerRef.name"}, {"name":"Expiry", "type":"date", "jsonPath":".status.notAfter"}, {"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSpec {
    /// Subject common name
    pub common_name: String,
    /// DNS subject alternative names, written verbatim and in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_names: Vec<String>,
    /// IP subject alternative names
    /// Entries that are not IPv4/IPv6 literals are dropped at issuance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_addresses: Vec<String>,
    /// Name of the TLS Secret written in the Certificate's namespace
    pub secret_name: String,
    /// Validity of each issued certificate
    /// Format: Go-style duration string (e.g., "2160h", "90d", "1h30m")
    /// Default: "2160h" (90 days)
    #[serde(default = "default_duration")]
    pub duration: String,
    /// How long before expiry the certificate is re-issued
    /// Unparsable values fall back to the default
    /// Default: "720h" (30 days)
    #[serde(default = "default_renew_before")]
    pub renew_before: String,
    /// Issuer used to sign the certificate. Only SelfSigned is implemented.
    #[serde(default)]
    pub issuer_ref: IssuerRef,
    /// Roll Deployments that consume the Secret after every issuance
    #[serde(default = "default_false")]
    pub restart_deployments: bool,
}

/// Reference to the issuer that signs a certificate
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuerRef {
    /// Name of the issuer
    #[serde(default)]
    pub name: String,
    /// Kind of the issuer
    #[serde(default)]
    pub kind: IssuerKind,
}

/// Issuer kinds understood by the controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum IssuerKind {
    /// Certificate signed by its own key
    #[default]
    SelfSigned,
    /// Certificate signed by a CA key pair held in a Secret
    #[serde(rename = "CA")]
    Ca,
    /// Certificate signed by an external issuer
    External,
}

impl fmt::Display for IssuerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssuerKind::SelfSigned => f.write_str("SelfSigned"),
            IssuerKind::Ca => f.write_str("CA"),
            IssuerKind::External => f.write_str("External"),
        }
    }
}

#[must_use]
pub fn default_duration() -> String {
    DEFAULT_CERTIFICATE_DURATION.to_string()
}

#[must_use]
pub fn default_renew_before() -> String {
    DEFAULT_RENEW_BEFORE.to_string()
}

#[must_use]
pub fn default_false() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_defaults_applied_on_deserialize() {
        let spec: CertificateSpec = serde_json::from_value(serde_json::json!({
            "commonName": "myapp.default.svc",
            "secretName": "myapp-tls"
        }))
        .unwrap();

        assert_eq!(spec.duration, "2160h");
        assert_eq!(spec.renew_before, "720h");
        assert_eq!(spec.issuer_ref.kind, IssuerKind::SelfSigned);
        assert!(!spec.restart_deployments);
        assert!(spec.dns_names.is_empty());
        assert!(spec.ip_addresses.is_empty());
    }

    #[test]
    fn test_issuer_kind_wire_names() {
        let kind: IssuerKind = serde_json::from_value(serde_json::json!("CA")).unwrap();
        assert_eq!(kind, IssuerKind::Ca);
        assert_eq!(
            serde_json::to_value(IssuerKind::SelfSigned).unwrap(),
            serde_json::json!("SelfSigned")
        );
        assert_eq!(IssuerKind::External.to_string(), "External");
    }

    #[test]
    fn test_unknown_issuer_kind_rejected() {
        let result: Result<IssuerKind, _> = serde_json::from_value(serde_json::json!("Vault"));
        assert!(result.is_err());
    }
}
