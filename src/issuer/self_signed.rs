//! # Self-Signed Issuer
//!
//! Builds a leaf certificate signed by its own freshly generated key.
//! Every call consumes new entropy: key material and serial numbers are never reused.

use super::{GenerationError, IssuedCertificate};
use crate::constants::{CERTIFICATE_ORGANIZATION, DEFAULT_CERTIFICATE_DURATION};
use crate::controller::reconciler::validation::parse_chrono_duration;
use crate::crd::CertificateSpec;
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, Rng};
use rcgen::{
    CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, Ia5String, IsCa,
    KeyPair, KeyUsagePurpose, SanType, SerialNumber,
};
use std::net::IpAddr;
use time::OffsetDateTime;
use tracing::debug;

/// Generate a self-signed certificate and private key for `spec`
///
/// `not_before` is `now` truncated to whole seconds (the resolution of X.509
/// validity), so `not_after - not_before` equals the parsed duration exactly.
pub fn generate(
    spec: &CertificateSpec,
    now: DateTime<Utc>,
) -> Result<IssuedCertificate, GenerationError> {
    let duration_str = if spec.duration.trim().is_empty() {
        DEFAULT_CERTIFICATE_DURATION
    } else {
        spec.duration.as_str()
    };
    let validity = parse_chrono_duration(duration_str)?;

    let not_before = DateTime::<Utc>::from_timestamp(now.timestamp(), 0).unwrap_or(now);
    let not_after = not_before
        .checked_add_signed(validity)
        .ok_or(GenerationError::ValidityOutOfRange { not_before })?;

    let serial: u128 = OsRng.gen();

    let mut params = CertificateParams::default();
    params.not_before = to_offset_date_time(not_before)?;
    params.not_after = to_offset_date_time(not_after)?;
    params.serial_number = Some(serial_number_bytes(serial));

    let mut distinguished_name = DistinguishedName::new();
    distinguished_name.push(DnType::CommonName, spec.common_name.as_str());
    distinguished_name.push(DnType::OrganizationName, CERTIFICATE_ORGANIZATION);
    params.distinguished_name = distinguished_name;

    for name in &spec.dns_names {
        let dns = Ia5String::try_from(name.clone()).map_err(|source| {
            GenerationError::InvalidSubjectAltName {
                name: name.clone(),
                source,
            }
        })?;
        params.subject_alt_names.push(SanType::DnsName(dns));
    }
    params
        .subject_alt_names
        .extend(parse_ip_addresses(&spec.ip_addresses).into_iter().map(SanType::IpAddress));

    params.is_ca = IsCa::ExplicitNoCa;
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ServerAuth,
        ExtendedKeyUsagePurpose::ClientAuth,
    ];

    let key_pair = KeyPair::generate().map_err(GenerationError::KeyGeneration)?;
    let certificate = params
        .self_signed(&key_pair)
        .map_err(GenerationError::Signing)?;

    let serial_number = format!("{serial:x}");
    debug!(
        "Generated self-signed certificate for CN={} serial={} notAfter={}",
        spec.common_name,
        serial_number,
        not_after.to_rfc3339()
    );

    Ok(IssuedCertificate {
        certificate_pem: certificate.pem(),
        private_key_pem: key_pair.serialize_pem(),
        not_before,
        not_after,
        serial_number,
    })
}

/// Keep only the entries that are valid IPv4/IPv6 literals, in order
#[must_use]
pub fn parse_ip_addresses(ip_addresses: &[String]) -> Vec<IpAddr> {
    ip_addresses
        .iter()
        .filter_map(|ip| match ip.trim().parse::<IpAddr>() {
            Ok(addr) => Some(addr),
            Err(_) => {
                debug!("Dropping IP subject alternative name '{}': not an IP literal", ip);
                None
            }
        })
        .collect()
}

fn serial_number_bytes(serial: u128) -> SerialNumber {
    let bytes = serial.to_be_bytes();
    // DER integers carry no leading zero octets; keep one byte for a zero serial
    let first = bytes
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(bytes.len() - 1);
    SerialNumber::from_slice(&bytes[first..])
}

fn to_offset_date_time(at: DateTime<Utc>) -> Result<OffsetDateTime, GenerationError> {
    OffsetDateTime::from_unix_timestamp(at.timestamp())
        .map_err(|_| GenerationError::ValidityOutOfRange { not_before: at })
}
