//! Bearer token sources.
//!
//! The fetch client never stores credentials itself. It asks a
//! [`TokenSource`] once per logical call and attaches whatever comes back.

use std::future::Future;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

/// Accessor for a bearer credential. May be asynchronous.
pub trait TokenSource: Send + Sync {
    /// Resolve the current token, or `None` when the user is signed out.
    fn token(&self) -> BoxFuture<'_, Option<String>>;
}

/// A fixed token, typically from the command line.
#[derive(Debug, Clone)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl TokenSource for StaticToken {
    fn token(&self) -> BoxFuture<'_, Option<String>> {
        futures_util::future::ready(self.0.clone()).boxed()
    }
}

/// Reads the token from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl TokenSource for EnvToken {
    fn token(&self) -> BoxFuture<'_, Option<String>> {
        let value = std::env::var(&self.var).ok();
        futures_util::future::ready(value).boxed()
    }
}

/// Extracts a named cookie from a `Cookie` header string.
#[derive(Debug, Clone)]
pub struct CookieToken {
    cookie_header: String,
    name: String,
}

impl CookieToken {
    pub fn new(cookie_header: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            cookie_header: cookie_header.into(),
            name: name.into(),
        }
    }
}

impl TokenSource for CookieToken {
    fn token(&self) -> BoxFuture<'_, Option<String>> {
        let value = cookie_value(&self.cookie_header, &self.name).map(str::to_string);
        futures_util::future::ready(value).boxed()
    }
}

/// Token source backed by an async closure.
pub struct FnToken<F>(F);

/// Wrap an async closure as a [`TokenSource`].
pub fn token_fn<F, Fut>(f: F) -> FnToken<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Option<String>> + Send + 'static,
{
    FnToken(f)
}

impl<F, Fut> TokenSource for FnToken<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Option<String>> + Send + 'static,
{
    fn token(&self) -> BoxFuture<'_, Option<String>> {
        (self.0)().boxed()
    }
}

/// Look up `name` in a `Cookie` header value (`a=1; b=2`).
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}
