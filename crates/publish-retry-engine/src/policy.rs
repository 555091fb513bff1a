use std::time::Duration;

/// Retry budget and delays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total publish attempts, rate-limit retries included.
    pub max_retries: u32,
    /// Upper bound for exponential backoff.
    pub backoff_cap: Duration,
    /// Wait used when a rate-limit signal carries no retry-after.
    pub default_rate_limit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_cap: Duration::from_secs(60),
            default_rate_limit: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Backoff after a transient failure on 0-based `attempt`: `min(2^attempt, cap)` seconds.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let secs = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        Duration::from_secs(secs).min(self.backoff_cap)
    }

    /// Attempt count, never below one.
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(0), Duration::from_secs(1));
        assert_eq!(policy.backoff_for(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(5), Duration::from_secs(32));
        assert_eq!(policy.backoff_for(6), Duration::from_secs(60));
        assert_eq!(policy.backoff_for(200), Duration::from_secs(60));
    }

    #[test]
    fn zero_budget_still_attempts_once() {
        let policy = RetryPolicy {
            max_retries: 0,
            ..Default::default()
        };
        assert_eq!(policy.attempts(), 1);
    }
}
