//! Retry classification.
//!
//! # Responsibilities
//! - Decide whether a failed attempt may be retried
//! - Track how many attempts a logical call is allowed
//!
//! # Design Decisions
//! - Timeouts and transport failures are transient
//! - Non-2xx responses, aborts, bad URLs and decode errors are terminal

use crate::fetch::FetchError;

/// Whether a failed attempt is eligible for another try.
pub fn is_retryable(error: &FetchError) -> bool {
    matches!(error, FetchError::Timeout(_) | FetchError::Network(_))
}

/// Attempt accounting for one logical call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    retries: u32,
}

impl RetryPolicy {
    /// Allow `retries` additional attempts after the first failure.
    pub fn new(retries: u32) -> Self {
        Self { retries }
    }

    /// Total number of physical attempts permitted.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Whether attempt number `attempt` (0-based) may be followed by another
    /// one after failing with `error`.
    pub fn should_retry(&self, attempt: u32, error: &FetchError) -> bool {
        attempt < self.retries && is_retryable(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::ErrorBody;
    use std::time::Duration;

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(is_retryable(&FetchError::Timeout(Duration::from_millis(5))));
        assert!(is_retryable(&FetchError::Network("connection reset".into())));
    }

    #[test]
    fn test_terminal_errors_are_not_retryable() {
        let http = FetchError::Http {
            status: 503,
            status_text: "Service Unavailable".into(),
            body: ErrorBody::Empty,
        };
        assert!(!is_retryable(&http));
        assert!(!is_retryable(&FetchError::Aborted));
        assert!(!is_retryable(&FetchError::Decode("eof".into())));
    }

    #[test]
    fn test_policy_attempt_budget() {
        let policy = RetryPolicy::new(2);
        let err = FetchError::Network("down".into());
        assert_eq!(policy.max_attempts(), 3);
        assert!(policy.should_retry(0, &err));
        assert!(policy.should_retry(1, &err));
        assert!(!policy.should_retry(2, &err));
        assert!(!RetryPolicy::new(0).should_retry(0, &err));
    }
}
