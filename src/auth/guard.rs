//! Token-based route protection.
//!
//! A request is authenticated when it carries a non-empty token cookie or a
//! bearer `Authorization` header. Protected pages bounce anonymous users to
//! the sign-in page; the sign-in/sign-up/reset pages bounce signed-in users
//! back home.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::auth::token::cookie_value;
use crate::config::AuthConfig;

/// Outcome of evaluating a path against the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// Redirect to the sign-in page, carrying the original path.
    RedirectToSignIn(String),
    /// Redirect a signed-in user away from an auth page.
    RedirectHome(String),
}

/// Whether the request headers carry a credential.
pub fn is_authenticated(headers: &HeaderMap, cookie_name: &str) -> bool {
    let has_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|cookies| cookie_value(cookies, cookie_name).is_some());

    let has_bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| !token.trim().is_empty());

    has_cookie || has_bearer
}

/// Route protection rules.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    cookie_name: String,
    sign_in_path: String,
    home_path: String,
    public_paths: Vec<String>,
    auth_paths: Vec<String>,
}

impl RouteGuard {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            cookie_name: config.cookie_name.clone(),
            sign_in_path: config.sign_in_path.clone(),
            home_path: config.home_path.clone(),
            public_paths: config.public_paths.clone(),
            auth_paths: config.auth_paths.clone(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Decide what to do with a request for `path`.
    pub fn decide(&self, path: &str, authenticated: bool) -> GuardDecision {
        let is_auth_page = self.auth_paths.iter().any(|p| path_matches(p, path));

        if is_auth_page {
            return if authenticated {
                GuardDecision::RedirectHome(self.home_path.clone())
            } else {
                GuardDecision::Allow
            };
        }

        if authenticated || self.public_paths.iter().any(|p| path_matches(p, path)) {
            return GuardDecision::Allow;
        }

        let next: String = url::form_urlencoded::byte_serialize(path.as_bytes()).collect();
        GuardDecision::RedirectToSignIn(format!("{}?next={}", self.sign_in_path, next))
    }

    /// Evaluate a request's headers and path.
    pub fn check(&self, path: &str, headers: &HeaderMap) -> GuardDecision {
        self.decide(path, is_authenticated(headers, &self.cookie_name))
    }
}

/// `/` matches only itself; any other prefix matches itself and its children.
fn path_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return path == "/";
    }
    let prefix = prefix.trim_end_matches('/');
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Axum middleware applying a [`RouteGuard`].
pub async fn route_guard_middleware(
    State(guard): State<Arc<RouteGuard>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    match guard.check(&path, request.headers()) {
        GuardDecision::Allow => next.run(request).await,
        GuardDecision::RedirectToSignIn(location) => {
            tracing::debug!(path = %path, "Unauthenticated request redirected to sign-in");
            Redirect::temporary(&location).into_response()
        }
        GuardDecision::RedirectHome(location) => {
            tracing::debug!(path = %path, "Authenticated request redirected away from auth page");
            Redirect::temporary(&location).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    fn guard() -> RouteGuard {
        RouteGuard::from_config(&AuthConfig::default())
    }

    #[test]
    fn test_authentication_predicate() {
        let mut headers = HeaderMap::new();
        assert!(!is_authenticated(&headers, "token"));

        headers.insert(header::COOKIE, HeaderValue::from_static("lang=en; token=abc"));
        assert!(is_authenticated(&headers, "token"));

        let mut bearer = HeaderMap::new();
        bearer.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert!(is_authenticated(&bearer, "token"));

        let mut empty = HeaderMap::new();
        empty.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(!is_authenticated(&empty, "token"));
    }

    #[test]
    fn test_decisions() {
        let guard = guard();
        assert_eq!(
            guard.decide("/dashboard/orders", false),
            GuardDecision::RedirectToSignIn("/signin?next=%2Fdashboard%2Forders".into())
        );
        assert_eq!(guard.decide("/dashboard/orders", true), GuardDecision::Allow);
        assert_eq!(guard.decide("/signin", false), GuardDecision::Allow);
        assert_eq!(
            guard.decide("/signup", true),
            GuardDecision::RedirectHome("/dashboard".into())
        );
        assert_eq!(guard.decide("/static/logo.svg", false), GuardDecision::Allow);
    }

    #[test]
    fn test_prefix_matching_respects_segments() {
        assert!(path_matches("/static", "/static/app.js"));
        assert!(path_matches("/static/", "/static"));
        assert!(!path_matches("/static", "/staticky"));
        assert!(path_matches("/", "/"));
        assert!(!path_matches("/", "/orders"));
    }

    #[tokio::test]
    async fn test_middleware_redirects_anonymous() {
        let guard = Arc::new(guard());
        let app = Router::new()
            .route("/dashboard", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(guard, route_guard_middleware));

        let res = app
            .clone()
            .oneshot(Request::builder().uri("/dashboard").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            res.headers().get(header::LOCATION).unwrap(),
            "/signin?next=%2Fdashboard"
        );

        let res = app
            .oneshot(
                Request::builder()
                    .uri("/dashboard")
                    .header(header::COOKIE, "token=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
