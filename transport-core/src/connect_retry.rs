//! Bounded connect-retry policy.
//!
//! The original source hard-codes "4 attempts, 2-second sleep between
//! attempts" directly into `Establish`. This module pulls that policy out
//! into a small configurable type, in the shape of the teacher's
//! `ReconnectState` (attempt counter + interval), but fixed-interval rather
//! than exponential-backoff, since spec.md's retry contract is a flat
//! delay, not a doubling one.

use std::time::Duration;

/// Default remote-refused/early-discovery retry policy: 4 attempts with a
/// fixed 2-second delay between them, as specified.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

/// Tracks connect attempts and the fixed delay between them.
#[derive(Debug, Clone)]
pub struct ConnectRetryPolicy {
    interval: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl ConnectRetryPolicy {
    #[must_use]
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            attempt: 0,
        }
    }

    /// Attempts-left including the current one, `max_attempts` at the
    /// start and counting down to zero.
    #[must_use]
    pub const fn attempts_remaining(&self) -> u32 {
        self.max_attempts - self.attempt
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub const fn attempts_made(&self) -> u32 {
        self.attempt
    }

    /// Record that one attempt has just been made. Returns `true` while
    /// further attempts remain.
    pub fn record_attempt(&mut self) -> bool {
        self.attempt += 1;
        self.attempt < self.max_attempts
    }
}

impl Default for ConnectRetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL, DEFAULT_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_spec_constants() {
        let policy = ConnectRetryPolicy::default();
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.interval(), Duration::from_secs(2));
        assert_eq!(policy.attempts_remaining(), 4);
    }

    #[test]
    fn record_attempt_counts_down() {
        let mut policy = ConnectRetryPolicy::default();
        assert!(policy.record_attempt()); // 1/4, 3 remain -> more to try
        assert!(policy.record_attempt()); // 2/4
        assert!(policy.record_attempt()); // 3/4
        assert!(!policy.record_attempt()); // 4/4, exhausted
        assert_eq!(policy.attempts_made(), 4);
        assert_eq!(policy.attempts_remaining(), 0);
    }

    #[test]
    fn custom_policy_for_fast_tests() {
        let mut policy = ConnectRetryPolicy::new(Duration::from_millis(1), 2);
        assert!(policy.record_attempt());
        assert!(!policy.record_attempt());
    }
}
