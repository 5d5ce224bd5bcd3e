//! Fetch error taxonomy.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Body of a non-2xx response, decoded on a best-effort basis.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorBody {
    /// Body parsed as JSON.
    Json(Value),
    /// Body that was not valid JSON.
    Text(String),
    /// No body at all.
    Empty,
}

impl ErrorBody {
    /// Decode raw response bytes: JSON first, raw text otherwise.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return ErrorBody::Empty;
        }
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => ErrorBody::Json(value),
            Err(_) => ErrorBody::Text(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

impl std::fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorBody::Json(value) => write!(f, "{}", value),
            ErrorBody::Text(text) => write!(f, "{}", text),
            ErrorBody::Empty => write!(f, "<empty>"),
        }
    }
}

/// Errors produced by a logical fetch call.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Response received with a non-2xx status.
    #[error("HTTP {status} {status_text}: {body}")]
    Http {
        status: u16,
        status_text: String,
        body: ErrorBody,
    },

    /// The attempt exceeded its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Transport-level failure (connect, DNS, reset, ...).
    #[error("network error: {0}")]
    Network(String),

    /// The call was cancelled or superseded.
    #[error("request aborted")]
    Aborted,

    /// Target could not be resolved to an absolute URL.
    #[error("invalid URL '{target}': {reason}")]
    InvalidUrl { target: String, reason: String },

    /// The request was rejected before it was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The response body could not be decoded.
    #[error("failed to decode response body: {0}")]
    Decode(String),

    /// `refetch` was called before any target was known.
    #[error("no target to fetch")]
    NoTarget,
}

impl FetchError {
    /// Whether this error marks a deliberate cancellation.
    pub fn is_aborted(&self) -> bool {
        matches!(self, FetchError::Aborted)
    }

    /// Status code of an HTTP error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_body_prefers_json() {
        let body = ErrorBody::from_bytes(br#"{"message":"not found"}"#);
        assert_eq!(body, ErrorBody::Json(json!({"message": "not found"})));
    }

    #[test]
    fn test_error_body_falls_back_to_text() {
        let body = ErrorBody::from_bytes(b"<html>oops</html>");
        assert_eq!(body, ErrorBody::Text("<html>oops</html>".into()));
        assert_eq!(ErrorBody::from_bytes(b""), ErrorBody::Empty);
    }

    #[test]
    fn test_http_error_display() {
        let err = FetchError::Http {
            status: 404,
            status_text: "Not Found".into(),
            body: ErrorBody::Text("missing".into()),
        };
        assert_eq!(err.to_string(), "HTTP 404 Not Found: missing");
        assert_eq!(err.status(), Some(404));
        assert!(!err.is_aborted());
    }
}
