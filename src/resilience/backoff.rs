//! Exponential backoff.

use std::time::Duration;

/// Calculate the delay before retry `attempt` (1-based).
///
/// Attempt 0 is the initial request and never waits. Retry `i` waits
/// `base * 2^(i-1)`, saturating, and capped at `max` when one is given.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Option<Duration>) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay = Duration::from_millis(base_ms.saturating_mul(exponential_base));

    match max {
        Some(cap) => delay.min(cap),
        None => delay,
    }
}
