//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Physical attempt:
//!     → timeouts.rs (race the transport against the attempt deadline)
//!     → On failure: retries.rs (classify: transient or terminal)
//!     → backoff.rs (delay before the next attempt)
//! ```
//!
//! # Design Decisions
//! - HTTP status errors are answers, not failures: never retried
//! - Cancellation is terminal and silent
//! - Backoff is deterministic (no jitter) so callers can reason about timing

pub mod backoff;
pub mod retries;
pub mod timeouts;
