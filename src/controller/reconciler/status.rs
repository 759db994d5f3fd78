//! # Status Updates
//!
//! Writes to the Certificate status subresource.
//!
//! The status is owned by the controller, so a conflicting write is retried by
//! re-reading the Certificate and re-applying the same change on top of it.

use crate::constants::MAX_CONFLICT_RETRIES;
use crate::crd::{
    Certificate, CertificateStatus, Condition, CONDITION_AVAILABLE, CONDITION_READY,
    REASON_CERTIFICATE_ISSUED, REASON_RECONCILING,
};
use crate::issuer::IssuedCertificate;
use crate::store::{namespaced_name, ObjectStore, StoreError};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Apply `change` to the status and persist it
pub async fn persist_status(
    store: &dyn ObjectStore,
    certificate: &Certificate,
    change: impl Fn(&mut CertificateStatus),
) -> Result<Certificate, StoreError> {
    let (namespace, name) = namespaced_name(certificate)?;
    let mut current = certificate.clone();
    let mut retries = 0;

    loop {
        change(current.status.get_or_insert_with(CertificateStatus::default));
        match store.update_certificate_status(&current).await {
            Ok(updated) => return Ok(updated),
            Err(e) if e.is_conflict() && retries < MAX_CONFLICT_RETRIES => {
                retries += 1;
                debug!(
                    "Conflict updating status of Certificate {}/{} (retry {}/{})",
                    namespace, name, retries, MAX_CONFLICT_RETRIES
                );
                current = store.get_certificate(&namespace, &name).await?;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Record a successful issuance: all issuance fields plus Ready and Available
pub async fn record_issuance(
    store: &dyn ObjectStore,
    certificate: &Certificate,
    issued: &IssuedCertificate,
    renewal_time: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Certificate, StoreError> {
    let name = certificate.metadata.name.clone().unwrap_or_default();
    persist_status(store, certificate, |status| {
        apply_issuance(status, issued, renewal_time, &name, now);
    })
    .await
}

/// Best-effort `Ready=False` with `reason`; issuance fields are left as they are
pub async fn record_failure(
    store: &dyn ObjectStore,
    certificate: &Certificate,
    reason: &str,
    message: &str,
    now: DateTime<Utc>,
) {
    let result = persist_status(store, certificate, |status| {
        status
            .conditions
            .upsert(Condition::new(CONDITION_READY, false, reason, message, now));
    })
    .await;

    if let Err(e) = result {
        warn!("Failed to update Certificate status after {}: {}", reason, e);
    }
}

pub fn apply_issuance(
    status: &mut CertificateStatus,
    issued: &IssuedCertificate,
    renewal_time: DateTime<Utc>,
    certificate_name: &str,
    now: DateTime<Utc>,
) {
    status.not_before = Some(issued.not_before);
    status.not_after = Some(issued.not_after);
    status.renewal_time = Some(renewal_time);
    status.serial_number = Some(issued.serial_number.clone());
    status.last_renewal_time = Some(now);

    status.conditions.upsert(Condition::new(
        CONDITION_READY,
        true,
        REASON_CERTIFICATE_ISSUED,
        "Certificate has been issued successfully",
        now,
    ));
    status.conditions.upsert(Condition::new(
        CONDITION_AVAILABLE,
        true,
        REASON_RECONCILING,
        format!("Certificate for ({certificate_name}) issued successfully"),
        now,
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::ConditionStatus;
    use chrono::{Duration, TimeZone};

    fn issued(now: DateTime<Utc>) -> IssuedCertificate {
        IssuedCertificate {
            certificate_pem: "CERT".to_string(),
            private_key_pem: "KEY".to_string(),
            not_before: now,
            not_after: now + Duration::days(90),
            serial_number: "abc123".to_string(),
        }
    }

    #[test]
    fn test_apply_issuance_sets_all_fields() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let renewal = now + Duration::days(60);
        let mut status = CertificateStatus::default();

        apply_issuance(&mut status, &issued(now), renewal, "web", now);

        assert_eq!(status.not_before, Some(now));
        assert_eq!(status.not_after, Some(now + Duration::days(90)));
        assert_eq!(status.renewal_time, Some(renewal));
        assert_eq!(status.serial_number.as_deref(), Some("abc123"));
        assert_eq!(status.last_renewal_time, Some(now));

        let ready = status.conditions.get(CONDITION_READY).unwrap();
        assert_eq!(ready.status, ConditionStatus::True);
        assert_eq!(ready.reason, REASON_CERTIFICATE_ISSUED);

        let available = status.conditions.get(CONDITION_AVAILABLE).unwrap();
        assert_eq!(available.reason, REASON_RECONCILING);
        assert_eq!(available.message, "Certificate for (web) issued successfully");
    }
}
