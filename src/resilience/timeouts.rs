//! Timeout enforcement.
//!
//! A configured, positive timeout races the attempt against a timer. When the
//! timer wins, the attempt future is dropped, which cancels the in-flight
//! request, and the attempt fails with [`FetchError::Timeout`].

use std::future::Future;
use std::time::Duration;

use crate::fetch::{FetchError, FetchResult};

/// Run `fut` under an optional deadline.
pub async fn with_timeout<F, T>(timeout: Option<Duration>, fut: F) -> FetchResult<T>
where
    F: Future<Output = FetchResult<T>>,
{
    match timeout {
        Some(limit) if !limit.is_zero() => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(limit)),
        },
        _ => fut.await,
    }
}
