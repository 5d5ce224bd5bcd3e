//! Command-line front end for the resilient fetch client.
//!
//! ```text
//! resilient-fetch get /api/v1/products --base-url https://shop.example.com --retries 3
//! resilient-fetch request /api/v1/products --method POST --data '{"name":"Burger"}'
//! resilient-fetch check-route /dashboard/orders --token abc123
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderValue};
use clap::{Args, Parser, Subcommand};
use reqwest::Method;
use serde_json::Value;

use resilient_fetch::auth::{GuardDecision, RouteGuard, StaticToken};
use resilient_fetch::config::{load_config, ClientConfig};
use resilient_fetch::fetch::{ClientSettings, FetchClient, FetchError, FetchOptions};
use resilient_fetch::observability::logging;
use resilient_fetch::ReqwestTransport;

#[derive(Parser)]
#[command(name = "resilient-fetch")]
#[command(about = "HTTP client with timeouts, retries and cancellation", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// GET a URL and print the body
    Get(RequestArgs),
    /// Send a request with any method
    Request {
        #[command(flatten)]
        args: RequestArgs,

        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
    },
    /// Evaluate the route guard for a path
    CheckRoute {
        path: String,

        /// Treat the request as carrying this session token
        #[arg(long)]
        token: Option<String>,
    },
}

#[derive(Args)]
struct RequestArgs {
    /// Absolute URL, or a path joined onto the base URL
    target: String,

    #[arg(long)]
    base_url: Option<String>,

    #[arg(long)]
    timeout_ms: Option<u64>,

    #[arg(long)]
    retries: Option<u32>,

    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Bearer token (overrides the configured token source)
    #[arg(short, long)]
    token: Option<String>,

    /// Print the body as text instead of decoding JSON
    #[arg(long)]
    raw: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => ClientConfig::default(),
    };

    if let Err(e) = logging::init(&config.observability) {
        eprintln!("Warning: logging already initialized: {}", e);
    }

    let result = match cli.command {
        Commands::Get(args) => run_request(&config, args, Method::GET, None).await,
        Commands::Request { args, method, data } => match Method::from_bytes(method.to_uppercase().as_bytes()) {
            Ok(method) => run_request(&config, args, method, data).await,
            Err(_) => Err(format!("invalid method '{}'", method)),
        },
        Commands::CheckRoute { path, token } => check_route(&config, &path, token),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
    }
}

async fn run_request(
    config: &ClientConfig,
    args: RequestArgs,
    method: Method,
    data: Option<String>,
) -> Result<(), String> {
    let mut config = config.clone();
    if let Some(base) = args.base_url {
        config.client.base_url = Some(base);
    }

    let settings = ClientSettings::from_config(&config).map_err(|e| e.to_string())?;
    let transport = ReqwestTransport::with_user_agent(&config.client.user_agent).map_err(|e| e.to_string())?;
    let client: FetchClient<Value> = FetchClient::new(transport, settings);

    let mut options = FetchOptions::new().method(method).parse_json(!args.raw);
    if let Some(ms) = args.timeout_ms {
        options = options.timeout(Duration::from_millis(ms));
    }
    if let Some(retries) = args.retries {
        options = options.retries(retries);
    }
    if let Some(ms) = args.retry_delay_ms {
        options = options.retry_delay(Duration::from_millis(ms));
    }
    if let Some(token) = args.token {
        options = options.auth_token(StaticToken::new(token));
    }
    if let Some(data) = data {
        let body: Value = serde_json::from_str(&data).map_err(|e| format!("--data is not JSON: {}", e))?;
        options = options.json(&body).map_err(|e| e.to_string())?;
    }

    let result = tokio::select! {
        res = client.fetch(&args.target, options) => res,
        _ = tokio::signal::ctrl_c() => {
            client.abort();
            Err(FetchError::Aborted)
        }
    };

    match result {
        Ok(Value::String(text)) => {
            println!("{}", text);
            Ok(())
        }
        Ok(value) => {
            let pretty = serde_json::to_string_pretty(&value).map_err(|e| e.to_string())?;
            println!("{}", pretty);
            Ok(())
        }
        Err(FetchError::Aborted) => Err("request aborted".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

fn check_route(config: &ClientConfig, path: &str, token: Option<String>) -> Result<(), String> {
    let guard = RouteGuard::from_config(&config.auth);

    let mut headers = HeaderMap::new();
    if let Some(token) = token {
        let cookie = HeaderValue::from_str(&format!("{}={}", guard.cookie_name(), token))
            .map_err(|_| "token is not a valid cookie value".to_string())?;
        headers.insert(header::COOKIE, cookie);
    }

    match guard.check(path, &headers) {
        GuardDecision::Allow => println!("allow"),
        GuardDecision::RedirectToSignIn(location) | GuardDecision::RedirectHome(location) => {
            println!("redirect {}", location)
        }
    }
    Ok(())
}
