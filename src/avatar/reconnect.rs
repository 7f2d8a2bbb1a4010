//! Reconnect policy for avatar stream creation
//!
//! Stream creation is the only retried operation in the gateway. The
//! policy is a bounded number of attempts with one fixed delay between
//! them; there is no backoff and no jitter.

use std::time::Duration;

/// Bounded fixed-delay retry policy
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Total attempts allowed, including the first
    pub max_attempts: u32,
    /// Fixed pause between attempts
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl ReconnectPolicy {
    /// Whether another attempt is allowed after `completed_attempts` failures
    #[must_use]
    pub const fn should_retry(&self, completed_attempts: u32) -> bool {
        completed_attempts < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_values() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(2));
    }

    #[test]
    fn retries_until_attempt_bound() {
        let policy = ReconnectPolicy::default();
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!policy.should_retry(10));
    }

    #[test]
    fn single_attempt_policy_never_retries() {
        let policy = ReconnectPolicy {
            max_attempts: 1,
            delay: Duration::from_millis(10),
        };
        assert!(!policy.should_retry(1));
    }
}
