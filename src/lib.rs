//! Resilient HTTP fetch client library.
//!
//! # Architecture Overview
//!
//! ```text
//!   consumer ──fetch/refetch/abort──▶ FetchClient ──▶ Transport ──▶ HTTP endpoint
//!      ▲                                 │    │
//!      └──────── watch<FetchState> ◀─────┘    └── TokenSource (bearer)
//!
//!   axum app ──▶ route_guard_middleware ──▶ protected pages
//! ```

pub mod auth;
pub mod config;
pub mod fetch;
pub mod observability;
pub mod resilience;
pub mod transport;

pub use config::ClientConfig;
pub use fetch::{FetchClient, FetchError, FetchOptions, FetchState};
pub use transport::{ReqwestTransport, Transport};
