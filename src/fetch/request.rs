//! Target resolution and request shaping.

use reqwest::header::{HeaderValue, AUTHORIZATION, CACHE_CONTROL, PRAGMA, REFERER};
use url::Url;

use crate::fetch::error::{FetchError, FetchResult};
use crate::fetch::options::{CacheMode, Credentials, FetchOptions, RequestMode};
use crate::transport::HttpRequest;

/// Resolve `target` to an absolute URL, joining relative targets onto `base`.
pub fn resolve_target(base: Option<&Url>, target: &str) -> FetchResult<Url> {
    let target = target.trim();
    let invalid = |reason: String| FetchError::InvalidUrl {
        target: target.to_string(),
        reason,
    };

    if target.is_empty() {
        return Err(invalid("empty target".to_string()));
    }

    let url = match Url::parse(target) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => match base {
            Some(base) => base.join(target).map_err(|e| invalid(e.to_string()))?,
            None => return Err(invalid("relative target without a base URL".to_string())),
        },
        Err(e) => return Err(invalid(e.to_string())),
    };

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    Ok(url)
}

/// Whether `url` shares the base URL's origin. No base means same-origin.
fn same_origin(base: Option<&Url>, url: &Url) -> bool {
    base.map_or(true, |base| base.origin() == url.origin())
}

/// Build the wire request for one logical call.
///
/// `token` has already been resolved from the token source; it is attached
/// as a bearer credential unless the caller set `Authorization` explicitly or
/// the credentials mode forbids it.
pub fn build_request(
    base: Option<&Url>,
    url: Url,
    options: &FetchOptions,
    token: Option<String>,
) -> FetchResult<HttpRequest> {
    let same_origin = same_origin(base, &url);

    if options.mode == RequestMode::SameOrigin && !same_origin {
        return Err(FetchError::InvalidRequest(format!(
            "cross-origin request to {} in same-origin mode",
            url
        )));
    }

    let mut headers = options.headers.clone();

    let attach = match options.credentials {
        Credentials::Omit => false,
        Credentials::SameOrigin => same_origin,
        Credentials::Include => true,
    };
    if let Some(token) = token.filter(|t| attach && !t.trim().is_empty()) {
        if !headers.contains_key(AUTHORIZATION) {
            let value = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
                .map_err(|_| FetchError::InvalidRequest("token is not a valid header value".into()))?;
            headers.insert(AUTHORIZATION, value);
        }
    }

    match options.cache {
        CacheMode::Default | CacheMode::ForceCache => {}
        CacheMode::NoStore => {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        }
        CacheMode::NoCache => {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        }
        CacheMode::Reload => {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        }
    }

    if let Some(referrer) = options.referrer.as_deref().filter(|r| !r.is_empty()) {
        if !headers.contains_key(REFERER) {
            let value = HeaderValue::from_str(referrer)
                .map_err(|_| FetchError::InvalidRequest(format!("invalid referrer '{}'", referrer)))?;
            headers.insert(REFERER, value);
        }
    }

    Ok(HttpRequest {
        method: options.method.clone(),
        url,
        headers,
        body: options.body.clone(),
        redirect: options.redirect,
    })
}
