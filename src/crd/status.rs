//! # Certificate Status
//!
//! Observed state of a Certificate: the issued validity window and a set of
//! conditions keyed by type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Condition type reporting whether the current certificate is usable
pub const CONDITION_READY: &str = "Ready";
/// Condition type reporting whether the certificate has been made available
pub const CONDITION_AVAILABLE: &str = "Available";

pub const REASON_CERTIFICATE_ISSUED: &str = "CertificateIssued";
pub const REASON_GENERATION_FAILED: &str = "GenerationFailed";
pub const REASON_SECRET_UPDATE_FAILED: &str = "SecretUpdateFailed";
pub const REASON_RECONCILING: &str = "Reconciling";

/// Status of the Certificate resource
///
/// The issuance fields (`notBefore`, `notAfter`, `renewalTime`, `serialNumber`,
/// `lastRenewalTime`) always describe a single issuance and are written together.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateStatus {
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Conditions,
    /// Start of the current certificate's validity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    /// Expiry of the current certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_after: Option<DateTime<Utc>>,
    /// When the current certificate becomes due for renewal (notAfter - renewBefore)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renewal_time: Option<DateTime<Utc>>,
    /// Serial number of the current certificate, lowercase hex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    /// When the current certificate was issued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_renewal_time: Option<DateTime<Utc>>,
}

/// Tri-state condition status as used by Kubernetes conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl From<bool> for ConditionStatus {
    fn from(value: bool) -> Self {
        if value {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        }
    }
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,
    /// Machine-readable reason code
    #[serde(default)]
    pub reason: String,
    /// Message describing the condition
    #[serde(default)]
    pub message: String,
    /// Last time the status flipped
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    pub fn new(
        r#type: &str,
        status: impl Into<ConditionStatus>,
        reason: &str,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            r#type: r#type.to_string(),
            status: status.into(),
            reason: reason.to_string(),
            message: message.into(),
            last_transition_time: now,
        }
    }
}

/// Conditions keyed by type, kept in first-insertion order
///
/// Serialized as a plain list so the wire shape matches Kubernetes conventions.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(transparent)]
pub struct Conditions(Vec<Condition>);

impl Conditions {
    /// Replace the condition with the same type, or append it.
    ///
    /// The existing `lastTransitionTime` is kept when the status does not change.
    /// Returns true when anything observable changed.
    pub fn upsert(&mut self, mut condition: Condition) -> bool {
        match self.0.iter_mut().find(|c| c.r#type == condition.r#type) {
            Some(existing) => {
                if existing.status == condition.status {
                    condition.last_transition_time = existing.last_transition_time;
                }
                if *existing == condition {
                    return false;
                }
                *existing = condition;
                true
            }
            None => {
                self.0.push(condition);
                true
            }
        }
    }

    #[must_use]
    pub fn get(&self, r#type: &str) -> Option<&Condition> {
        self.0.iter().find(|c| c.r#type == r#type)
    }

    #[must_use]
    pub fn is_true(&self, r#type: &str) -> bool {
        self.get(r#type)
            .is_some_and(|c| c.status == ConditionStatus::True)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_upsert_appends_new_types_in_order() {
        let mut conditions = Conditions::default();
        assert!(conditions.upsert(Condition::new(CONDITION_READY, true, "A", "a", at(0))));
        assert!(conditions.upsert(Condition::new(CONDITION_AVAILABLE, true, "B", "b", at(0))));

        let types: Vec<&str> = conditions.iter().map(|c| c.r#type.as_str()).collect();
        assert_eq!(types, vec![CONDITION_READY, CONDITION_AVAILABLE]);
    }

    #[test]
    fn test_upsert_replaces_by_type() {
        let mut conditions = Conditions::default();
        conditions.upsert(Condition::new(CONDITION_READY, true, "Old", "old", at(0)));
        conditions.upsert(Condition::new(CONDITION_READY, false, "New", "new", at(10)));

        assert_eq!(conditions.len(), 1);
        let ready = conditions.get(CONDITION_READY).unwrap();
        assert_eq!(ready.status, ConditionStatus::False);
        assert_eq!(ready.reason, "New");
        assert_eq!(ready.last_transition_time, at(10));
    }

    #[test]
    fn test_upsert_keeps_transition_time_when_status_unchanged() {
        let mut conditions = Conditions::default();
        conditions.upsert(Condition::new(CONDITION_READY, true, "Issued", "first", at(0)));
        let changed = conditions.upsert(Condition::new(
            CONDITION_READY,
            true,
            "Issued",
            "second",
            at(0) + Duration::hours(1),
        ));

        assert!(changed);
        let ready = conditions.get(CONDITION_READY).unwrap();
        assert_eq!(ready.message, "second");
        assert_eq!(ready.last_transition_time, at(0));
    }

    #[test]
    fn test_upsert_identical_condition_is_noop() {
        let mut conditions = Conditions::default();
        conditions.upsert(Condition::new(CONDITION_READY, true, "Issued", "ok", at(0)));
        assert!(!conditions.upsert(Condition::new(CONDITION_READY, true, "Issued", "ok", at(5))));
    }

    #[test]
    fn test_is_true() {
        let mut conditions = Conditions::default();
        assert!(!conditions.is_true(CONDITION_READY));
        conditions.upsert(Condition::new(CONDITION_READY, false, "X", "x", at(0)));
        assert!(!conditions.is_true(CONDITION_READY));
        conditions.upsert(Condition::new(CONDITION_READY, true, "Y", "y", at(1)));
        assert!(conditions.is_true(CONDITION_READY));
    }

    #[test]
    fn test_conditions_serialize_as_list() {
        let mut status = CertificateStatus::default();
        status
            .conditions
            .upsert(Condition::new(CONDITION_READY, true, "Issued", "ok", at(0)));

        let value = serde_json::to_value(&status).unwrap();
        assert!(value["conditions"].is_array());
        assert_eq!(value["conditions"][0]["type"], "Ready");
        assert_eq!(value["conditions"][0]["status"], "True");
        assert!(value.get("notAfter").is_none());
    }
}
