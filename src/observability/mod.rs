//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! FetchClient produces:
//!     → logging.rs (structured events keyed by call_id)
//!     → metrics.rs (attempt, retry and outcome counters; call latency)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON optional) for machine parsing
//! - Metrics go through the `metrics` facade; no recorder means no cost

pub mod logging;
pub mod metrics;
