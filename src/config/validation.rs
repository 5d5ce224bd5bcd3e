//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Base URL must be absolute http(s)
//! - Route guard paths must be absolute and non-conflicting
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>

use thiserror::Error;
use url::Url;

use crate::config::schema::ClientConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("client.base_url '{0}' is not an absolute http(s) URL")]
    InvalidBaseUrl(String),

    #[error("client.max_retry_delay_ms ({max}) is lower than retry_delay_ms ({base})")]
    RetryCapBelowBase { base: u64, max: u64 },

    #[error("auth.{field} '{path}' must start with '/'")]
    RelativePath { field: &'static str, path: String },

    #[error("auth.cookie_name must not be empty")]
    EmptyCookieName,

    #[error("auth.sign_in_path '{0}' must be listed in auth.auth_paths")]
    SignInNotAuthPage(String),

    #[error("auth.home_path '{0}' must not be an auth page")]
    HomeIsAuthPage(String),
}

pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Some(base) = &config.client.base_url {
        match Url::parse(base) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => errors.push(ValidationError::InvalidBaseUrl(base.clone())),
        }
    }

    let client = &config.client;
    if client.max_retry_delay_ms != 0 && client.max_retry_delay_ms < client.retry_delay_ms {
        errors.push(ValidationError::RetryCapBelowBase {
            base: client.retry_delay_ms,
            max: client.max_retry_delay_ms,
        });
    }

    let auth = &config.auth;
    if auth.cookie_name.trim().is_empty() {
        errors.push(ValidationError::EmptyCookieName);
    }

    let single = [("sign_in_path", &auth.sign_in_path), ("home_path", &auth.home_path)];
    let lists = auth
        .public_paths
        .iter()
        .map(|p| ("public_paths", p))
        .chain(auth.auth_paths.iter().map(|p| ("auth_paths", p)));
    for (field, path) in single.into_iter().chain(lists) {
        if !path.starts_with('/') {
            errors.push(ValidationError::RelativePath {
                field,
                path: path.clone(),
            });
        }
    }

    if !auth.auth_paths.contains(&auth.sign_in_path) {
        errors.push(ValidationError::SignInNotAuthPage(auth.sign_in_path.clone()));
    }
    if auth.auth_paths.contains(&auth.home_path) {
        errors.push(ValidationError::HomeIsAuthPage(auth.home_path.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
