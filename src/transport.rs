//! Pluggable HTTP transport.
//!
//! The fetch client only needs "send this request, give me status, headers
//! and body". [`ReqwestTransport`] is the production implementation; tests
//! plug in scripted transports.

use std::future::Future;

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use thiserror::Error;
use url::Url;

use crate::fetch::RedirectMode;

/// A request ready to go on the wire.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub redirect: RedirectMode,
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    /// Reason phrase from the status line, when it differs from the
    /// canonical one for `status`.
    pub reason: Option<String>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            reason: None,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not reach the server.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The exchange failed after it started.
    #[error("request failed: {0}")]
    Request(String),

    /// Reading the response body failed.
    #[error("failed to read body: {0}")]
    Body(String),

    /// A 3xx arrived while redirects were forbidden.
    #[error("redirect to {0} refused")]
    RedirectRefused(String),

    /// The transport could not be constructed.
    #[error("transport setup failed: {0}")]
    Setup(String),
}

/// Something that can perform one HTTP round-trip.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

/// Production transport built on reqwest.
///
/// Redirect policy is a client-level setting in reqwest, so two clients are
/// kept: one following redirects, one returning 3xx untouched.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    follow: reqwest::Client,
    manual: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_user_agent(concat!("resilient-fetch/", env!("CARGO_PKG_VERSION")))
    }

    pub fn with_user_agent(user_agent: &str) -> Result<Self, TransportError> {
        let follow = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;
        let manual = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;
        Ok(Self { follow, manual })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            TransportError::Body(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

impl Transport for ReqwestTransport {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send {
        let client = match request.redirect {
            RedirectMode::Follow => self.follow.clone(),
            RedirectMode::Error | RedirectMode::Manual => self.manual.clone(),
        };

        async move {
            let mut builder = client
                .request(request.method, request.url.clone())
                .headers(request.headers);
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await?;
            let status = response.status();

            if request.redirect == RedirectMode::Error && status.is_redirection() {
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("<unknown>")
                    .to_string();
                return Err(TransportError::RedirectRefused(location));
            }

            // hyper only records the phrase when it is not the canonical one.
            let reason = response
                .extensions()
                .get::<hyper::ext::ReasonPhrase>()
                .and_then(|phrase| std::str::from_utf8(phrase.as_bytes()).ok())
                .map(str::to_string);
            let headers = response.headers().clone();
            let body = response.bytes().await?.to_vec();

            Ok(HttpResponse {
                status,
                reason,
                headers,
                body,
            })
        }
    }
}
