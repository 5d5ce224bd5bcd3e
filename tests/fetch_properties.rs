//! Behavioral guarantees of the fetch client, checked against scripted
//! transports so timing and interleaving are deterministic.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::sync::{oneshot, Notify};
use tokio::time::Instant;

use resilient_fetch::auth::{token_fn, StaticToken};
use resilient_fetch::fetch::{ClientSettings, ErrorBody, FetchClient, FetchError, FetchOptions};
use resilient_fetch::transport::{HttpRequest, HttpResponse, Transport, TransportError};

/// Fails every attempt with a transport error and records when it ran.
#[derive(Default)]
struct FailingTransport {
    attempts: Mutex<Vec<Instant>>,
}

impl Transport for FailingTransport {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.attempts.lock().unwrap().push(Instant::now());
        Err(TransportError::Connect("connection refused".into()))
    }
}

/// Always answers with the same status and body.
struct FixedTransport {
    status: StatusCode,
    body: &'static str,
    calls: AtomicU32,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FixedTransport {
    fn new(status: StatusCode, body: &'static str) -> Self {
        Self {
            status,
            body,
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl Transport for FixedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        Ok(HttpResponse::new(self.status, self.body))
    }
}

/// Hands the "network" to a detached task that completes only when the
/// gate opens, independent of whether anyone still awaits it.
struct DetachedTransport {
    gate: Arc<Notify>,
    started: Arc<Notify>,
    completed: Arc<AtomicU32>,
}

impl Transport for DetachedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let (tx, rx) = oneshot::channel();
        let gate = self.gate.clone();
        let completed = self.completed.clone();
        let notified = gate.notified_owned();
        tokio::spawn(async move {
            notified.await;
            completed.fetch_add(1, Ordering::SeqCst);
            let body = format!(r#"{{"path":"{}"}}"#, request.url.path());
            let _ = tx.send(HttpResponse::new(StatusCode::OK, body));
        });
        self.started.notify_one();
        rx.await
            .map_err(|_| TransportError::Request("network task dropped".into()))
    }
}

/// Answers `{"x":1}` after a fixed delay.
struct DelayedTransport {
    delay: Duration,
    calls: AtomicU32,
}

impl Transport for DelayedTransport {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(HttpResponse::new(StatusCode::OK, r#"{"x":1}"#))
    }
}

fn fast_settings() -> ClientSettings {
    ClientSettings {
        retry_delay: Duration::from_millis(1),
        ..ClientSettings::default()
    }
}

#[tokio::test]
async fn test_transient_failures_make_exactly_n_plus_one_attempts() {
    for retries in [0u32, 1, 4] {
        let client: FetchClient<Value, _> = FetchClient::new(FailingTransport::default(), fast_settings());
        let err = client
            .fetch("http://api.test/orders", FetchOptions::new().retries(retries))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Network(_)));
        let state = client.state();
        assert!(matches!(state.error, Some(FetchError::Network(_))));
        assert!(!state.loading);
        assert!(!state.aborted);
        assert_eq!(
            client.transport().attempts.lock().unwrap().len(),
            retries as usize + 1,
            "retries = {}",
            retries
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_backoff_doubles_between_attempts() {
    let client: FetchClient<Value, _> = FetchClient::new(FailingTransport::default(), ClientSettings::default());
    let _ = client
        .fetch(
            "http://api.test/orders",
            FetchOptions::new()
                .retries(3)
                .retry_delay(Duration::from_millis(300)),
        )
        .await;

    let attempts = client.transport().attempts.lock().unwrap().clone();
    assert_eq!(attempts.len(), 4);
    let gaps: Vec<Duration> = attempts.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(
        gaps,
        vec![
            Duration::from_millis(300),
            Duration::from_millis(600),
            Duration::from_millis(1200),
        ]
    );
}

#[tokio::test]
async fn test_http_error_is_not_retried() {
    let client: FetchClient<Value, _> = FetchClient::new(
        FixedTransport::new(StatusCode::NOT_FOUND, r#"{"message":"no such product"}"#),
        fast_settings(),
    );

    let err = client
        .fetch("http://api.test/api/v1/products/42", FetchOptions::new().retries(5))
        .await
        .unwrap_err();

    match err {
        FetchError::Http {
            status,
            status_text,
            body,
        } => {
            assert_eq!(status, 404);
            assert_eq!(status_text, "Not Found");
            assert_eq!(body, ErrorBody::Json(json!({"message": "no such product"})));
        }
        other => panic!("expected HTTP error, got {:?}", other),
    }
    assert_eq!(client.transport().calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.state().error.and_then(|e| e.status()), Some(404));
}

#[tokio::test]
async fn test_abort_suppresses_late_resolution() {
    let gate = Arc::new(Notify::new());
    let started = Arc::new(Notify::new());
    let completed = Arc::new(AtomicU32::new(0));
    let client: FetchClient<Value, _> = FetchClient::new(
        DetachedTransport {
            gate: gate.clone(),
            started: started.clone(),
            completed: completed.clone(),
        },
        ClientSettings::default(),
    );

    let call = {
        let client = client.clone();
        tokio::spawn(async move { client.fetch("http://api.test/slow", FetchOptions::new()).await })
    };
    started.notified().await;
    client.abort();

    // Let the underlying network finish after the abort.
    gate.notify_waiters();
    while completed.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    assert!(matches!(call.await.unwrap(), Err(FetchError::Aborted)));
    let state = client.state();
    assert!(state.data.is_none());
    assert!(state.error.is_none());
    assert!(state.aborted);
    assert!(!state.loading);
}

#[tokio::test]
async fn test_abort_right_after_spawn() {
    let client: FetchClient<Value, _> = FetchClient::new(
        DelayedTransport {
            delay: Duration::from_millis(50),
            calls: AtomicU32::new(0),
        },
        ClientSettings::default(),
    );

    let call = tokio::spawn(client.fetch("http://api.test/x", FetchOptions::new()));
    client.abort();

    assert!(matches!(call.await.unwrap(), Err(FetchError::Aborted)));
    let state = client.state();
    assert!(state.data.is_none());
    assert!(state.error.is_none());
    assert!(state.aborted);
    assert!(!state.loading);
    assert_eq!(client.transport().calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_last_call_wins() {
    let gate = Arc::new(Notify::new());
    let started = Arc::new(Notify::new());
    let completed = Arc::new(AtomicU32::new(0));
    let slow: FetchClient<Value, _> = FetchClient::new(
        DetachedTransport {
            gate: gate.clone(),
            started: started.clone(),
            completed: completed.clone(),
        },
        ClientSettings::default(),
    );

    let first = {
        let client = slow.clone();
        tokio::spawn(async move { client.fetch("http://api.test/first", FetchOptions::new()).await })
    };
    started.notified().await;

    let second = {
        let client = slow.clone();
        tokio::spawn(async move { client.fetch("http://api.test/second", FetchOptions::new()).await })
    };
    started.notified().await;

    // Both network tasks finish; only the second call may publish.
    gate.notify_waiters();

    assert!(matches!(first.await.unwrap(), Err(FetchError::Aborted)));
    assert_eq!(second.await.unwrap().unwrap(), json!({"path": "/second"}));

    let state = slow.state();
    assert_eq!(state.data, Some(json!({"path": "/second"})));
    assert!(state.error.is_none());
    assert!(!state.loading);
    assert!(!state.aborted);
}

#[tokio::test]
async fn test_bearer_token_injection() {
    let client: FetchClient<Value, _> =
        FetchClient::new(FixedTransport::new(StatusCode::OK, "{}"), ClientSettings::default());

    client
        .fetch(
            "http://api.test/api/v1/users",
            FetchOptions::new().auth_token(token_fn(|| async { Some("abc123".to_string()) })),
        )
        .await
        .unwrap();

    client
        .fetch(
            "http://api.test/api/v1/users",
            FetchOptions::new()
                .header(AUTHORIZATION, HeaderValue::from_static("Bearer explicit"))
                .auth_token(StaticToken::new("abc123")),
        )
        .await
        .unwrap();

    let requests = client.transport().requests.lock().unwrap();
    assert_eq!(requests[0].headers.get(AUTHORIZATION).unwrap(), "Bearer abc123");
    assert_eq!(requests[1].headers.get(AUTHORIZATION).unwrap(), "Bearer explicit");
}

#[tokio::test]
async fn test_token_source_is_consulted_once_per_call() {
    let lookups = Arc::new(AtomicU32::new(0));
    let counter = lookups.clone();
    let settings = ClientSettings {
        auth_token: Some(Arc::new(token_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Some("t".to_string()) }
        }))),
        retry_delay: Duration::from_millis(1),
        ..ClientSettings::default()
    };
    let client: FetchClient<Value, _> = FetchClient::new(FailingTransport::default(), settings);

    let _ = client
        .fetch("http://api.test/x", FetchOptions::new().retries(2))
        .await;

    assert_eq!(client.transport().attempts.lock().unwrap().len(), 3);
    assert_eq!(lookups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_subscribers_see_loading_then_result() {
    let client: FetchClient<Value, _> =
        FetchClient::new(FixedTransport::new(StatusCode::OK, r#"{"id":7}"#), ClientSettings::default());
    let mut rx = client.subscribe();

    let call = {
        let client = client.clone();
        tokio::spawn(async move { client.fetch("http://api.test/p/7", FetchOptions::new()).await })
    };

    let state = rx.wait_for(|s| s.data.is_some()).await.unwrap().clone();
    assert_eq!(state.data, Some(json!({"id": 7})));
    assert!(!state.loading);
    call.await.unwrap().unwrap();
}
