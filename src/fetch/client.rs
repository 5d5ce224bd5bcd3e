//! Resilient fetch client.
//!
//! # Responsibilities
//! - Resolve targets against the injected base URL
//! - Attach bearer credentials from a token source
//! - Enforce per-attempt timeouts and retry transient failures with backoff
//! - Publish `{data, error, loading}` through a watch channel
//! - Cancel deterministically (`abort`, superseding call, `close`, drop)
//!
//! # Cancellation
//! ```text
//! fetch() ──▶ epoch += 1 ──▶ attempt 0 ──▶ backoff ──▶ attempt 1 ──▶ ...
//!                 ▲                 │                      │
//! abort() ────────┤                 └──── select! on epoch change
//! fetch() ────────┤
//! close() ────────┘  (also run when the last handle is dropped)
//! ```
//! Every logical call owns one epoch, taken when `fetch` is invoked rather
//! than when its future is first polled. Bumping the epoch cancels whatever
//! the call is waiting on, and every state write re-checks the epoch while
//! holding the state lock, so a stale call can never publish.
//!
//! # Ownership
//! [`FetchClient`] handles are counted. In-flight call futures and the task
//! spawned by [`FetchClient::activate`] hold the shared core directly, not a
//! handle, so dropping the last handle tears the client down even while
//! work is still running.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::fetch::error::{ErrorBody, FetchError, FetchResult};
use crate::fetch::options::{ClientSettings, FetchOptions};
use crate::fetch::request::{build_request, resolve_target};
use crate::fetch::state::FetchState;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::retries::RetryPolicy;
use crate::resilience::timeouts::with_timeout;
use crate::transport::{HttpRequest, ReqwestTransport, Transport, TransportError};

struct LastRequest {
    target: String,
    options: FetchOptions,
}

struct Inner<T, Tr> {
    transport: Tr,
    settings: ClientSettings,
    state: watch::Sender<FetchState<T>>,
    /// Current call epoch. Any change cancels the call holding the old value.
    epoch: watch::Sender<u64>,
    /// Cleared on teardown; nothing is published afterwards.
    active: AtomicBool,
    /// Live [`FetchClient`] handles.
    handles: AtomicUsize,
    last: Mutex<Option<LastRequest>>,
    auto_target: Option<String>,
    auto_options: FetchOptions,
    auto: bool,
}

/// HTTP client with timeout, retry and cancellation semantics.
///
/// Clones share state, so one clone can `abort` a call awaited on another.
/// Dropping the last clone has the same effect as [`FetchClient::close`].
pub struct FetchClient<T = Value, Tr = ReqwestTransport> {
    inner: Arc<Inner<T, Tr>>,
}

impl<T, Tr> Clone for FetchClient<T, Tr> {
    fn clone(&self) -> Self {
        self.inner.handles.fetch_add(1, Ordering::SeqCst);
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, Tr> Drop for FetchClient<T, Tr> {
    fn drop(&mut self) {
        if self.inner.handles.fetch_sub(1, Ordering::SeqCst) == 1 {
            tracing::debug!("Last fetch client handle dropped, tearing down");
            self.inner.close();
        }
    }
}

/// Builder for [`FetchClient`].
pub struct FetchClientBuilder<T, Tr> {
    transport: Tr,
    settings: ClientSettings,
    target: Option<String>,
    options: FetchOptions,
    auto: bool,
    _data: PhantomData<fn() -> T>,
}

impl<T, Tr> FetchClientBuilder<T, Tr>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
    Tr: Transport,
{
    /// Target fetched by [`FetchClient::activate`].
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Options for the automatic call.
    pub fn options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    /// Disable or enable the automatic call (enabled by default).
    pub fn auto(mut self, auto: bool) -> Self {
        self.auto = auto;
        self
    }

    pub fn build(self) -> FetchClient<T, Tr> {
        let (state, _) = watch::channel(FetchState::default());
        let (epoch, _) = watch::channel(0);

        FetchClient {
            inner: Arc::new(Inner {
                transport: self.transport,
                settings: self.settings,
                state,
                epoch,
                active: AtomicBool::new(true),
                handles: AtomicUsize::new(1),
                last: Mutex::new(None),
                auto_target: self.target,
                auto_options: self.options,
                auto: self.auto,
            }),
        }
    }
}

impl<T> FetchClient<T, ReqwestTransport>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Client with a reqwest transport configured from `config`.
    pub fn from_config(config: &ClientConfig) -> FetchResult<Self> {
        let settings = ClientSettings::from_config(config)?;
        let transport =
            ReqwestTransport::with_user_agent(&config.client.user_agent).map_err(transport_error)?;
        Ok(Self::new(transport, settings))
    }
}

impl<T, Tr> FetchClient<T, Tr>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
    Tr: Transport,
{
    pub fn new(transport: Tr, settings: ClientSettings) -> Self {
        Self::builder(transport, settings).build()
    }

    pub fn builder(transport: Tr, settings: ClientSettings) -> FetchClientBuilder<T, Tr> {
        FetchClientBuilder {
            transport,
            settings,
            target: None,
            options: FetchOptions::default(),
            auto: true,
            _data: PhantomData,
        }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.inner.settings
    }

    pub fn transport(&self) -> &Tr {
        &self.inner.transport
    }

    /// Current state snapshot.
    pub fn state(&self) -> FetchState<T> {
        self.inner.state.borrow().clone()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.inner.state.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Run the automatic call, if one was configured.
    ///
    /// Spawns one logical call on the current tokio runtime. Its error is
    /// logged and dropped; it is already visible in state. The task does not
    /// keep the client alive.
    pub fn activate(&self) -> Option<JoinHandle<()>> {
        if !self.inner.auto {
            return None;
        }
        let target = self
            .inner
            .auto_target
            .clone()
            .filter(|t| !t.trim().is_empty())?;

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(target_url = %target, error = %e, "No runtime for automatic fetch");
                return None;
            }
        };

        let call = self.fetch(&target, self.inner.auto_options.clone());
        Some(runtime.spawn(async move {
            if let Err(e) = call.await {
                tracing::debug!(target_url = %target, error = %e, "Automatic fetch failed");
            }
        }))
    }

    /// Perform one logical fetch call.
    ///
    /// The call starts here: it supersedes any call already in flight and
    /// marks the state loading before the returned future is polled, so an
    /// `abort()` issued right after this returns cancels it. Dropping the
    /// future before it completes aborts the call.
    pub fn fetch(
        &self,
        target: &str,
        options: FetchOptions,
    ) -> impl Future<Output = FetchResult<T>> + Send + 'static {
        self.inner.remember(target, &options);
        let call = self.inner.begin_call().map(|epoch| PendingCall {
            inner: Arc::clone(&self.inner),
            epoch,
            settled: false,
        });
        let target = target.to_string();

        async move {
            let Some(mut call) = call else {
                return Err(FetchError::Aborted);
            };
            let result = call.inner.complete(call.epoch, &target, &options).await;
            call.settled = true;
            result
        }
    }

    /// Repeat the last call, optionally with a new target or options.
    pub fn refetch(
        &self,
        target: Option<&str>,
        options: Option<FetchOptions>,
    ) -> impl Future<Output = FetchResult<T>> + Send + 'static {
        let next = {
            let last = self.inner.last.lock().unwrap_or_else(PoisonError::into_inner);
            let target = match (target, last.as_ref()) {
                (Some(t), _) => Some(t.to_string()),
                (None, Some(prev)) => Some(prev.target.clone()),
                (None, None) => None,
            };
            target.map(|target| {
                let options = options
                    .or_else(|| last.as_ref().map(|prev| prev.options.clone()))
                    .unwrap_or_default();
                (target, options)
            })
        };

        let call = next.map(|(target, options)| self.fetch(&target, options));
        async move {
            match call {
                Some(call) => call.await,
                None => Err(FetchError::NoTarget),
            }
        }
    }

    /// Cancel the call in flight. The call resolves to
    /// [`FetchError::Aborted`] and publishes nothing; state shows
    /// `aborted` instead.
    pub fn abort(&self) {
        self.inner.abort();
    }

    /// Tear the client down: cancel in-flight work and stop publishing.
    pub fn close(&self) {
        self.inner.close();
    }
}

/// A started call whose future has not finished yet.
struct PendingCall<T, Tr> {
    inner: Arc<Inner<T, Tr>>,
    epoch: u64,
    settled: bool,
}

impl<T, Tr> Drop for PendingCall<T, Tr> {
    fn drop(&mut self) {
        if !self.settled {
            self.inner.abandon(self.epoch);
        }
    }
}

impl<T, Tr> Inner<T, Tr> {
    fn remember(&self, target: &str, options: &FetchOptions) {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        *last = Some(LastRequest {
            target: target.to_string(),
            options: options.clone(),
        });
    }

    /// Start a new epoch and mark the state loading.
    fn begin_call(&self) -> Option<u64> {
        let mut started = None;
        self.state.send_if_modified(|state| {
            if !self.active.load(Ordering::SeqCst) {
                return false;
            }
            self.epoch.send_modify(|e| {
                *e += 1;
                started = Some(*e);
            });
            state.begin();
            true
        });
        started
    }

    fn abort(&self) {
        self.state.send_if_modified(|state| {
            self.epoch.send_modify(|e| *e += 1);
            if !self.active.load(Ordering::SeqCst) || !state.loading {
                return false;
            }
            state.abort();
            true
        });
    }

    /// Abort call `epoch` only if it is still the current one.
    fn abandon(&self, epoch: u64) {
        self.state.send_if_modified(|state| {
            if !self.active.load(Ordering::SeqCst) || *self.epoch.borrow() != epoch {
                return false;
            }
            self.epoch.send_modify(|e| *e += 1);
            state.abort();
            true
        });
    }

    fn close(&self) {
        self.state.send_if_modified(|_| {
            self.active.store(false, Ordering::SeqCst);
            self.epoch.send_modify(|e| *e += 1);
            false
        });
    }
}

impl<T, Tr> Inner<T, Tr>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
    Tr: Transport,
{
    /// Drive call `epoch` to its end and publish the outcome.
    async fn complete(&self, epoch: u64, target: &str, options: &FetchOptions) -> FetchResult<T> {
        let call_id = Uuid::new_v4();
        let start = Instant::now();
        tracing::debug!(call_id = %call_id, target_url = %target, method = %options.method, "Fetch started");

        let mut result = self.run_call(call_id, epoch, target, options).await;

        if !self.publish(epoch, &result) {
            result = Err(FetchError::Aborted);
        }

        match &result {
            Ok(_) => tracing::debug!(call_id = %call_id, "Fetch succeeded"),
            Err(FetchError::Aborted) => tracing::debug!(call_id = %call_id, "Fetch aborted"),
            Err(e) => tracing::warn!(call_id = %call_id, error = %e, "Fetch failed"),
        }
        if self.settings.metrics_enabled {
            metrics::record_outcome(metrics::outcome_label(&result), start);
        }

        result
    }

    /// Write the outcome of call `epoch` if it is still current.
    ///
    /// Returns false when the call was superseded, aborted or torn down.
    fn publish(&self, epoch: u64, result: &FetchResult<T>) -> bool {
        let mut published = false;
        self.state.send_if_modified(|state| {
            if !self.active.load(Ordering::SeqCst) || *self.epoch.borrow() != epoch {
                return false;
            }
            match result {
                Ok(data) => state.succeed(data.clone()),
                Err(FetchError::Aborted) => state.abort(),
                Err(e) => state.fail(e.clone()),
            }
            published = true;
            true
        });
        published
    }

    /// Resolves once `epoch` is no longer current.
    async fn cancelled(&self, epoch: u64) {
        let mut rx = self.epoch.subscribe();
        // The sender lives as long as `self`, so this only ends on change.
        let _ = rx.wait_for(|current| *current != epoch).await;
    }

    async fn run_call(
        &self,
        call_id: Uuid,
        epoch: u64,
        target: &str,
        options: &FetchOptions,
    ) -> FetchResult<T> {
        let settings = &self.settings;
        let base = settings.base_url.as_ref();
        let url = resolve_target(base, target)?;
        let resolved = settings.resolve(options);

        let token = match &resolved.auth_token {
            Some(source) => tokio::select! {
                biased;
                _ = self.cancelled(epoch) => return Err(FetchError::Aborted),
                token = source.token() => token,
            },
            None => None,
        };

        let request = build_request(base, url, options, token)?;
        let policy = RetryPolicy::new(resolved.retries);
        let mut attempt: u32 = 0;

        loop {
            if attempt > 0 {
                let delay = calculate_backoff(attempt, resolved.retry_delay, resolved.max_retry_delay);
                tracing::info!(call_id = %call_id, attempt = attempt, delay = ?delay, "Retrying request");
                if settings.metrics_enabled {
                    metrics::record_retry();
                }
                tokio::select! {
                    biased;
                    _ = self.cancelled(epoch) => return Err(FetchError::Aborted),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            if settings.metrics_enabled {
                metrics::record_attempt(request.method.as_str());
            }

            let outcome = tokio::select! {
                biased;
                _ = self.cancelled(epoch) => Err(FetchError::Aborted),
                res = with_timeout(resolved.timeout, self.attempt(request.clone(), resolved.parse_json)) => res,
            };

            match outcome {
                Ok(data) => return Ok(data),
                Err(e) if policy.should_retry(attempt, &e) => {
                    tracing::warn!(
                        call_id = %call_id,
                        attempt = attempt,
                        max_attempts = policy.max_attempts(),
                        error = %e,
                        "Attempt failed"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One physical round-trip plus decoding.
    async fn attempt(&self, request: HttpRequest, parse_json: bool) -> FetchResult<T> {
        let response = self.transport.send(request).await.map_err(transport_error)?;

        if !response.status.is_success() {
            // Prefer the phrase the server sent over the canonical one.
            let status_text = response
                .reason
                .clone()
                .or_else(|| response.status.canonical_reason().map(str::to_string))
                .unwrap_or_default();
            return Err(FetchError::Http {
                status: response.status.as_u16(),
                status_text,
                body: ErrorBody::from_bytes(&response.body),
            });
        }

        decode_body(&response.body, parse_json)
    }
}

fn transport_error(error: TransportError) -> FetchError {
    match error {
        TransportError::RedirectRefused(_) | TransportError::Setup(_) => {
            FetchError::InvalidRequest(error.to_string())
        }
        other => FetchError::Network(other.to_string()),
    }
}

/// Decode a successful body. An empty body decodes as JSON `null`; raw text
/// is handed to `T` as a JSON string.
fn decode_body<T: DeserializeOwned>(body: &[u8], parse_json: bool) -> FetchResult<T> {
    let decoded = if parse_json {
        if body.iter().all(u8::is_ascii_whitespace) {
            serde_json::from_value(Value::Null)
        } else {
            serde_json::from_slice(body)
        }
    } else {
        let text = String::from_utf8_lossy(body).into_owned();
        serde_json::from_value(Value::String(text))
    };
    decoded.map_err(|e| FetchError::Decode(e.to_string()))
}
