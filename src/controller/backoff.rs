//! # Fibonacci Backoff
//!
//! Retry delays for failed reconciliations that grow along the Fibonacci
//! sequence in whole minutes, capped at a maximum.
//!
//! With a 1 minute floor and 10 minute cap: 1m, 1m, 2m, 3m, 5m, 8m, 10m, 10m, ...
//!
//! ```
//! use certificate_controller::controller::backoff::FibonacciBackoff;
//! use std::time::Duration;
//!
//! let mut backoff = FibonacciBackoff::new(1, 10);
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(60));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(60));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(120));
//! ```

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibonacciBackoff {
    min_minutes: u64,
    max_minutes: u64,
    prev_minutes: u64,
    current_minutes: u64,
}

impl FibonacciBackoff {
    /// `min_minutes` is clamped to at least 1, `max_minutes` to at least `min_minutes`
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        let min_minutes = min_minutes.max(1);
        Self {
            min_minutes,
            max_minutes: max_minutes.max(min_minutes),
            prev_minutes: 0,
            current_minutes: min_minutes,
        }
    }

    /// Current delay in seconds; advances the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let seconds = self.current_minutes.saturating_mul(60);
        let next = self.prev_minutes.saturating_add(self.current_minutes);
        self.prev_minutes = self.current_minutes;
        self.current_minutes = next.min(self.max_minutes);
        seconds
    }

    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    pub fn reset(&mut self) {
        self.prev_minutes = 0;
        self.current_minutes = self.min_minutes;
    }
}
