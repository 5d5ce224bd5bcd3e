//! Authentication collaborators.
//!
//! - token.rs: where bearer credentials come from
//! - guard.rs: which routes require one

pub mod guard;
pub mod token;

pub use guard::{is_authenticated, route_guard_middleware, GuardDecision, RouteGuard};
pub use token::{token_fn, CookieToken, EnvToken, StaticToken, TokenSource};
