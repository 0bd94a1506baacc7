//! Retry policy for the run envelope.

use std::time::Duration;

use stockflow_core::config::RetryConfig;

/// Bounded fixed-delay retry policy applied to a whole run.
///
/// The envelope wraps the full extract-transform-load sequence, never an
/// individual stage: a retry re-runs the pipeline from extract.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum attempts per run, counting the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Whether another attempt may follow the given 1-based attempt number.
    #[inline]
    pub fn allows_another(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(1),
        }
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_secs(config.delay_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_budget_boundary() {
        let policy = RetryPolicy::new(4, Duration::from_millis(10));
        assert!(policy.allows_another(1));
        assert!(policy.allows_another(3));
        assert!(!policy.allows_another(4));
        assert!(!policy.allows_another(5));
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_attempts, 1);
    }

    #[test]
    fn test_from_config() {
        let policy = RetryPolicy::from(RetryConfig::default());
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.delay, Duration::from_secs(1));
    }
}
