//! # Renewal Policy
//!
//! Decides when a certificate must be re-issued and when the controller should
//! wake up next. All functions are pure and take `now` explicitly.

use crate::constants::{DEFAULT_RENEW_BEFORE, RENEWAL_HEADROOM_SECS, SHORT_REQUEUE_SECS};
use crate::controller::reconciler::validation::parse_chrono_duration;
use crate::crd::CertificateStatus;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

/// True when the certificate was never issued or its renewal time has been reached
#[must_use]
pub fn needs_renewal(status: Option<&CertificateStatus>, now: DateTime<Utc>) -> bool {
    match status.and_then(|s| s.renewal_time) {
        None => true,
        Some(renewal_time) => now >= renewal_time,
    }
}

/// Renewal time for a certificate expiring at `not_after`
///
/// An empty or unparsable `renew_before` falls back to the 720h default.
#[must_use]
pub fn compute_renewal_time(not_after: DateTime<Utc>, renew_before: &str) -> DateTime<Utc> {
    let lead = match parse_chrono_duration(renew_before) {
        Ok(lead) => lead,
        Err(e) => {
            debug!(
                "renewBefore '{}' not usable ({}), falling back to {}",
                renew_before, e, DEFAULT_RENEW_BEFORE
            );
            default_renew_before()
        }
    };

    not_after
        .checked_sub_signed(lead)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Delay until the next reconciliation of a certificate
///
/// - no renewal time recorded, or renewal overdue: short fixed delay
/// - less than the headroom left: half of what remains
/// - otherwise: wake up one headroom ahead of the renewal time
#[must_use]
pub fn compute_requeue_delay(renewal_time: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
    let short = Duration::from_secs(SHORT_REQUEUE_SECS);
    let headroom = Duration::from_secs(RENEWAL_HEADROOM_SECS);

    let Some(renewal_time) = renewal_time else {
        return short;
    };

    // Negative remaining time fails the conversion
    let Ok(remaining) = (renewal_time - now).to_std() else {
        return short;
    };

    if remaining < headroom {
        remaining / 2
    } else {
        remaining - headroom
    }
}

fn default_renew_before() -> chrono::Duration {
    parse_chrono_duration(DEFAULT_RENEW_BEFORE).unwrap_or_else(|_| chrono::Duration::days(30))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn status_with_renewal(renewal_time: DateTime<Utc>) -> CertificateStatus {
        CertificateStatus {
            renewal_time: Some(renewal_time),
            ..CertificateStatus::default()
        }
    }

    #[test]
    fn test_needs_renewal_without_status() {
        assert!(needs_renewal(None, now()));
    }

    #[test]
    fn test_needs_renewal_without_renewal_time() {
        assert!(needs_renewal(Some(&CertificateStatus::default()), now()));
    }

    #[test]
    fn test_needs_renewal_boundaries() {
        let renewal = now();
        let status = status_with_renewal(renewal);

        assert!(!needs_renewal(
            Some(&status),
            renewal - ChronoDuration::seconds(1)
        ));
        assert!(needs_renewal(Some(&status), renewal));
        assert!(needs_renewal(
            Some(&status),
            renewal + ChronoDuration::seconds(1)
        ));
    }

    #[test]
    fn test_compute_renewal_time_explicit() {
        let not_after = now() + ChronoDuration::days(90);
        assert_eq!(
            compute_renewal_time(not_after, "720h"),
            not_after - ChronoDuration::hours(720)
        );
        assert_eq!(
            compute_renewal_time(not_after, "24h"),
            not_after - ChronoDuration::hours(24)
        );
    }

    #[test]
    fn test_compute_renewal_time_defaults() {
        let not_after = now() + ChronoDuration::days(90);
        let expected = not_after - ChronoDuration::hours(720);

        assert_eq!(compute_renewal_time(not_after, ""), expected);
        assert_eq!(compute_renewal_time(not_after, "soon"), expected);
        assert_eq!(compute_renewal_time(not_after, "0h"), expected);
    }

    #[test]
    fn test_compute_renewal_time_strictly_before_not_after() {
        let not_after = now();
        for input in ["", "1s", "720h", "garbage", "0s"] {
            assert!(compute_renewal_time(not_after, input) < not_after);
        }
    }

    #[test]
    fn test_requeue_delay_without_renewal_time() {
        assert_eq!(compute_requeue_delay(None, now()), Duration::from_secs(60));
    }

    #[test]
    fn test_requeue_delay_overdue() {
        let renewal = now() - ChronoDuration::hours(1);
        assert_eq!(
            compute_requeue_delay(Some(renewal), now()),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_requeue_delay_within_last_hour_halves() {
        let renewal = now() + ChronoDuration::minutes(30);
        assert_eq!(
            compute_requeue_delay(Some(renewal), now()),
            Duration::from_secs(15 * 60)
        );
    }

    #[test]
    fn test_requeue_delay_exactly_at_renewal() {
        assert_eq!(compute_requeue_delay(Some(now()), now()), Duration::ZERO);
    }

    #[test]
    fn test_requeue_delay_far_out_wakes_an_hour_early() {
        let renewal = now() + ChronoDuration::hours(5);
        assert_eq!(
            compute_requeue_delay(Some(renewal), now()),
            Duration::from_secs(4 * 3600)
        );
    }

    #[test]
    fn test_requeue_delay_exactly_one_hour() {
        let renewal = now() + ChronoDuration::hours(1);
        assert_eq!(compute_requeue_delay(Some(renewal), now()), Duration::ZERO);
    }
}
