//! Fetch metrics.
//!
//! # Metrics
//! - `fetch_attempts_total` (counter): physical attempts by method
//! - `fetch_retries_total` (counter): attempts that were retried
//! - `fetch_outcomes_total` (counter): logical calls by outcome
//! - `fetch_duration_seconds` (histogram): logical call latency by outcome

use std::time::Instant;

use crate::fetch::FetchError;

/// Label for how a logical call ended.
pub fn outcome_label<T>(result: &Result<T, FetchError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(FetchError::Http { .. }) => "http_error",
        Err(FetchError::Timeout(_)) => "timeout",
        Err(FetchError::Network(_)) => "network_error",
        Err(FetchError::Aborted) => "aborted",
        Err(_) => "invalid",
    }
}

pub fn record_attempt(method: &str) {
    metrics::counter!("fetch_attempts_total", "method" => method.to_string()).increment(1);
}

pub fn record_retry() {
    metrics::counter!("fetch_retries_total").increment(1);
}

pub fn record_outcome(outcome: &'static str, start: Instant) {
    metrics::counter!("fetch_outcomes_total", "outcome" => outcome).increment(1);
    metrics::histogram!("fetch_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}
