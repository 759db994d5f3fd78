//! # Validation
//!
//! Parsing of user-supplied values from the Certificate spec.

mod duration;

pub use duration::{parse_chrono_duration, parse_duration, DurationError};
