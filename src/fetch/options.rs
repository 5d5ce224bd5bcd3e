//! Request descriptor and per-client settings.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, IntoHeaderName, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;
use url::Url;

use crate::auth::{EnvToken, TokenSource};
use crate::config::ClientConfig;
use crate::fetch::error::{FetchError, FetchResult};

/// When the bearer token from the token source may be attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Credentials {
    /// Never attach the token.
    Omit,
    /// Attach only when the target shares the base URL's origin.
    SameOrigin,
    /// Always attach.
    #[default]
    Include,
}

/// Cache directive translated into request headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Default,
    NoStore,
    Reload,
    NoCache,
    ForceCache,
}

/// How 3xx responses are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectMode {
    #[default]
    Follow,
    /// A redirect response fails the request.
    Error,
    /// The 3xx response is returned as-is.
    Manual,
}

/// Which origins a request may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    #[default]
    Cors,
    NoCors,
    /// Reject targets outside the base URL's origin.
    SameOrigin,
}

/// Options for a single logical fetch call.
///
/// `None` for the tunables (`timeout`, `retries`, ...) means "use the
/// client's [`ClientSettings`]".
#[derive(Clone, Default)]
pub struct FetchOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub credentials: Credentials,
    pub cache: CacheMode,
    pub redirect: RedirectMode,
    pub referrer: Option<String>,
    pub mode: RequestMode,
    pub parse_json: Option<bool>,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub retry_delay: Option<Duration>,
    pub auth_token: Option<Arc<dyn TokenSource>>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the request body and mark it as JSON.
    pub fn json<B: Serialize + ?Sized>(mut self, value: &B) -> FetchResult<Self> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| FetchError::InvalidRequest(format!("unserializable body: {}", e)))?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(bytes);
        Ok(self)
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn cache(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }

    pub fn redirect(mut self, redirect: RedirectMode) -> Self {
        self.redirect = redirect;
        self
    }

    pub fn referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    pub fn mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn parse_json(mut self, parse_json: bool) -> Self {
        self.parse_json = Some(parse_json);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    pub fn auth_token(mut self, source: impl TokenSource + 'static) -> Self {
        self.auth_token = Some(Arc::new(source));
        self
    }
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("body_len", &self.body.as_ref().map(Vec::len))
            .field("credentials", &self.credentials)
            .field("cache", &self.cache)
            .field("redirect", &self.redirect)
            .field("referrer", &self.referrer)
            .field("mode", &self.mode)
            .field("parse_json", &self.parse_json)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("retry_delay", &self.retry_delay)
            .field("auth_token", &self.auth_token.is_some())
            .finish()
    }
}

/// Settings injected into a client at construction.
#[derive(Clone)]
pub struct ClientSettings {
    pub base_url: Option<Url>,
    pub timeout: Option<Duration>,
    pub retries: u32,
    pub retry_delay: Duration,
    pub max_retry_delay: Option<Duration>,
    pub parse_json: bool,
    pub auth_token: Option<Arc<dyn TokenSource>>,
    pub metrics_enabled: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: None,
            retries: 0,
            retry_delay: Duration::from_millis(300),
            max_retry_delay: None,
            parse_json: true,
            auth_token: None,
            metrics_enabled: true,
        }
    }
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("retry_delay", &self.retry_delay)
            .field("max_retry_delay", &self.max_retry_delay)
            .field("parse_json", &self.parse_json)
            .field("auth_token", &self.auth_token.is_some())
            .field("metrics_enabled", &self.metrics_enabled)
            .finish()
    }
}

impl ClientSettings {
    /// Build settings from a loaded configuration.
    pub fn from_config(config: &ClientConfig) -> FetchResult<Self> {
        let client = &config.client;
        let base_url = client
            .base_url
            .as_deref()
            .map(|base| {
                Url::parse(base).map_err(|e| FetchError::InvalidUrl {
                    target: base.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let auth_token = config
            .auth
            .token_env
            .as_ref()
            .map(|var| Arc::new(EnvToken::new(var.clone())) as Arc<dyn TokenSource>);

        Ok(Self {
            base_url,
            timeout: (client.timeout_ms > 0).then(|| Duration::from_millis(client.timeout_ms)),
            retries: client.retries,
            retry_delay: Duration::from_millis(client.retry_delay_ms),
            max_retry_delay: (client.max_retry_delay_ms > 0)
                .then(|| Duration::from_millis(client.max_retry_delay_ms)),
            parse_json: client.parse_json,
            auth_token,
            metrics_enabled: config.observability.metrics_enabled,
        })
    }

    pub fn base_url(mut self, base: Url) -> Self {
        self.base_url = Some(base);
        self
    }

    /// Merge per-call options over these defaults.
    pub(crate) fn resolve(&self, options: &FetchOptions) -> ResolvedOptions {
        ResolvedOptions {
            timeout: options.timeout.or(self.timeout),
            retries: options.retries.unwrap_or(self.retries),
            retry_delay: options.retry_delay.unwrap_or(self.retry_delay),
            max_retry_delay: self.max_retry_delay,
            parse_json: options.parse_json.unwrap_or(self.parse_json),
            auth_token: options.auth_token.clone().or_else(|| self.auth_token.clone()),
        }
    }
}

/// Tunables for one logical call after defaults are applied.
#[derive(Clone)]
pub(crate) struct ResolvedOptions {
    pub timeout: Option<Duration>,
    pub retries: u32,
    pub retry_delay: Duration,
    pub max_retry_delay: Option<Duration>,
    pub parse_json: bool,
    pub auth_token: Option<Arc<dyn TokenSource>>,
}
