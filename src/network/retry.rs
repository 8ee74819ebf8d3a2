//! Reconnection budget

use std::time::Duration;

/// Failure reasons that reconnecting cannot fix
const NON_RETRYABLE: &[&str] = &["Endpoint malformed"];

/// Retry budget for one stream.
///
/// Only an explicit [`reset`](Self::reset) or [`set_retries`](Self::set_retries)
/// refills the budget; a connection that comes up and drops again still spends it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    current_attempt: u32,
    reconnect_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, reconnect_delay: Duration) -> Self {
        Self {
            max_retries,
            current_attempt: 0,
            reconnect_delay,
        }
    }

    /// Set the budget and forget earlier attempts
    pub fn set_retries(&mut self, max_retries: u32) {
        self.max_retries = max_retries;
        self.current_attempt = 0;
    }

    /// Whether a failure with `reason` should be followed by a reconnect
    pub fn should_retry(&self, reason: &str) -> bool {
        let retryable = !NON_RETRYABLE.iter().any(|fatal| reason.contains(fatal));
        retryable && self.current_attempt < self.max_retries
    }

    /// Consume one attempt; returns the attempt number
    pub fn record_attempt(&mut self) -> u32 {
        self.current_attempt = self.current_attempt.saturating_add(1);
        self.current_attempt
    }

    /// Refill the budget after a successful connection
    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn current_attempt(&self) -> u32 {
        self.current_attempt
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    pub fn set_reconnect_delay(&mut self, delay: Duration) {
        self.reconnect_delay = delay;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_exhaustion() {
        let mut policy = RetryPolicy::new(2, Duration::from_secs(1));
        assert!(policy.should_retry("Connection refused"));
        policy.record_attempt();
        assert!(policy.should_retry("Connection refused"));
        policy.record_attempt();
        assert!(!policy.should_retry("Connection refused"));

        policy.reset();
        assert!(policy.should_retry("Connection refused"));
    }

    #[test]
    fn test_malformed_endpoint_never_retries() {
        let policy = RetryPolicy::new(10, Duration::ZERO);
        assert!(!policy.should_retry("Endpoint malformed: missing host"));
    }

    #[test]
    fn test_set_retries_resets_attempts() {
        let mut policy = RetryPolicy::new(1, Duration::ZERO);
        policy.record_attempt();
        assert!(!policy.should_retry("timeout"));

        policy.set_retries(3);
        assert_eq!(policy.current_attempt(), 0);
        assert_eq!(policy.max_retries(), 3);
        assert!(policy.should_retry("timeout"));
    }

    #[test]
    fn test_zero_budget() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert!(!policy.should_retry("timeout"));
    }
}
