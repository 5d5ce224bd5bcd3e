//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Fetch defaults (base URL, timeouts, retries).
    pub client: FetchConfig,

    /// Credential lookup and route protection.
    pub auth: AuthConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Defaults applied to every request issued by a client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Base URL that relative targets are joined against.
    pub base_url: Option<String>,

    /// Per-attempt timeout in milliseconds (0 disables).
    pub timeout_ms: u64,

    /// Additional attempts after the first transient failure.
    pub retries: u32,

    /// Base delay between attempts in milliseconds.
    pub retry_delay_ms: u64,

    /// Upper bound on a single backoff delay (0 = uncapped).
    pub max_retry_delay_ms: u64,

    /// Decode response bodies as JSON.
    pub parse_json: bool,

    /// User-Agent sent by the reqwest transport.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: 0,
            retries: 0,
            retry_delay_ms: 300,
            max_retry_delay_ms: 0,
            parse_json: true,
            user_agent: concat!("resilient-fetch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Credential and route protection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Environment variable holding the bearer token.
    pub token_env: Option<String>,

    /// Name of the cookie that carries the session token.
    pub cookie_name: String,

    /// Where anonymous users are sent.
    pub sign_in_path: String,

    /// Where signed-in users land when they open an auth page.
    pub home_path: String,

    /// Paths reachable without a token.
    pub public_paths: Vec<String>,

    /// Sign-in, sign-up and password reset pages.
    pub auth_paths: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_env: None,
            cookie_name: "token".to_string(),
            sign_in_path: "/signin".to_string(),
            home_path: "/dashboard".to_string(),
            public_paths: vec![
                "/static".to_string(),
                "/favicon.ico".to_string(),
                "/api/health".to_string(),
            ],
            auth_paths: vec![
                "/signin".to_string(),
                "/signup".to_string(),
                "/reset-password".to_string(),
                "/forgot-password".to_string(),
            ],
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json_logs: bool,

    /// Record fetch metrics through the `metrics` facade.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "resilient_fetch=info".to_string(),
            json_logs: false,
            metrics_enabled: true,
        }
    }
}
