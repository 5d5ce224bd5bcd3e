//! Resilient fetch client.
//!
//! # Data Flow
//! ```text
//! fetch(target, options)
//!     → request.rs (resolve against base URL, attach bearer, shape headers)
//!     → client.rs (attempt loop: timeout, retry, backoff, cancellation)
//!     → transport (one physical round-trip)
//!     → state.rs (publish {data, error, loading} if still current)
//! ```

pub mod client;
pub mod error;
pub mod options;
pub mod request;
pub mod state;

pub use client::{FetchClient, FetchClientBuilder};
pub use error::{ErrorBody, FetchError, FetchResult};
pub use options::{CacheMode, ClientSettings, Credentials, FetchOptions, RedirectMode, RequestMode};
pub use state::FetchState;
