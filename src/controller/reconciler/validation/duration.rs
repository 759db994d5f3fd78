//! # Duration Validation
//!
//! Handles parsing and validating duration strings from the Certificate spec.

use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

/// One `<number><unit>` segment of a duration string
static SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<number>\d+(?:\.\d*)?|\.\d+)(?P<unit>ns|us|µs|ms|s|m|h|d)")
        .expect("duration segment regex is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("duration string cannot be empty")]
    Empty,
    #[error(
        "invalid duration format '{0}'. Expected <number><unit> segments (e.g., '2160h', '90d', '1h30m')"
    )]
    InvalidFormat(String),
    #[error("duration '{0}' must be greater than 0")]
    NotPositive(String),
    #[error("duration '{0}' is out of range")]
    OutOfRange(String),
}

/// Parse a Go-style duration string into `std::time::Duration`
///
/// Accepts one or more `<number><unit>` segments, for example "2160h", "1h30m",
/// "1.5h" or "90d". Units: ns, us (µs), ms, s, m, h and d (24h).
/// Zero durations are rejected since a certificate cannot have an empty window.
pub fn parse_duration(duration_str: &str) -> Result<Duration, DurationError> {
    let trimmed = duration_str.trim();

    if trimmed.is_empty() {
        return Err(DurationError::Empty);
    }

    let mut total_nanos: u128 = 0;
    let mut cursor = 0;

    for captures in SEGMENT.captures_iter(trimmed) {
        let (Some(whole), Some(number), Some(unit)) =
            (captures.get(0), captures.name("number"), captures.name("unit"))
        else {
            return Err(DurationError::InvalidFormat(trimmed.to_string()));
        };

        // Segments must be contiguous and cover the whole string
        if whole.start() != cursor {
            return Err(DurationError::InvalidFormat(trimmed.to_string()));
        }
        cursor = whole.end();

        let unit_nanos = unit_nanos(unit.as_str());
        let segment = segment_nanos(number.as_str(), unit_nanos)
            .ok_or_else(|| DurationError::OutOfRange(trimmed.to_string()))?;
        total_nanos = total_nanos
            .checked_add(segment)
            .ok_or_else(|| DurationError::OutOfRange(trimmed.to_string()))?;
    }

    if cursor != trimmed.len() {
        return Err(DurationError::InvalidFormat(trimmed.to_string()));
    }

    if total_nanos == 0 {
        return Err(DurationError::NotPositive(trimmed.to_string()));
    }

    let secs = u64::try_from(total_nanos / 1_000_000_000)
        .map_err(|_| DurationError::OutOfRange(trimmed.to_string()))?;
    #[allow(clippy::cast_possible_truncation, reason = "remainder is below 1e9")]
    let nanos = (total_nanos % 1_000_000_000) as u32;

    Ok(Duration::new(secs, nanos))
}

/// Parse a duration and convert it for timestamp arithmetic
pub fn parse_chrono_duration(duration_str: &str) -> Result<chrono::Duration, DurationError> {
    let duration = parse_duration(duration_str)?;
    chrono::Duration::from_std(duration)
        .map_err(|_| DurationError::OutOfRange(duration_str.trim().to_string()))
}

fn unit_nanos(unit: &str) -> u128 {
    match unit {
        "ns" => 1,
        "us" | "µs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 3_600 * 1_000_000_000,
        // "d"
        _ => 86_400 * 1_000_000_000,
    }
}

fn segment_nanos(number: &str, unit_nanos: u128) -> Option<u128> {
    let (whole, fraction) = match number.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (number, ""),
    };

    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().ok()?
    };
    let mut nanos = whole.checked_mul(unit_nanos)?;

    if !fraction.is_empty() {
        let fraction: f64 = format!("0.{fraction}").parse().ok()?;
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss,
            reason = "fraction is in [0, 1) so the product is bounded by unit_nanos"
        )]
        let partial = (fraction * unit_nanos as f64) as u128;
        nanos = nanos.checked_add(partial)?;
    }

    Some(nanos)
}
