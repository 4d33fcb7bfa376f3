//! Authenticated HTTP client builders.
//!
//! Every outbound request carries the Flash User-Agent, a JSON content
//! type, and — when a key resolves — a bearer token. Key resolution order:
//! explicit override, then the request's credential context, then the
//! environment / credentials file. The 30s client covers ordinary calls;
//! the 300s client covers bulk GraphQL operations; the blocking client
//! serves sync call sites (the queue handler, the update checker).

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};

use flash_domain::{Error, Result};

use crate::{context, credentials, user_agent};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const LONG_TIMEOUT: Duration = Duration::from_secs(300);

/// Resolve the effective API key for a request.
pub fn resolve_api_key(api_key_override: Option<&str>) -> Option<String> {
    if let Some(key) = api_key_override {
        let key = key.trim();
        if !key.is_empty() {
            return Some(key.to_string());
        }
    }
    context::get().or_else(credentials::get_api_key)
}

fn base_headers(api_key_override: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&user_agent::user_agent())
            .map_err(|e| Error::Http(format!("user agent header: {e}")))?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(key) = resolve_api_key(api_key_override) {
        let mut value = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| Error::Http(format!("authorization header: {e}")))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

/// Async client with the default 30s timeout.
pub fn authenticated_client(
    timeout: Option<Duration>,
    api_key_override: Option<&str>,
) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
        .default_headers(base_headers(api_key_override)?)
        .build()
        .map_err(|e| Error::Http(format!("building HTTP client: {e}")))
}

/// Async client for bulk operations (300s).
pub fn long_lived_client(api_key_override: Option<&str>) -> Result<reqwest::Client> {
    authenticated_client(Some(LONG_TIMEOUT), api_key_override)
}

/// Blocking client for synchronous call sites.
pub fn authenticated_blocking_client(
    timeout: Option<Duration>,
    api_key_override: Option<&str>,
) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
        .default_headers(base_headers(api_key_override)?)
        .build()
        .map_err(|e| Error::Http(format!("building HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_beats_everything() {
        assert_eq!(
            resolve_api_key(Some("override-key")).as_deref(),
            Some("override-key")
        );
    }

    #[test]
    fn blank_override_is_ignored() {
        // Falls through to context/env/file; in the bare test environment
        // that typically means no key at all.
        let resolved = resolve_api_key(Some("   "));
        assert_ne!(resolved.as_deref(), Some("   "));
    }

    #[tokio::test]
    async fn context_key_is_picked_up() {
        context::scope(Some("ctx-key".into()), async {
            assert_eq!(resolve_api_key(None).as_deref(), Some("ctx-key"));
        })
        .await;
    }

    #[test]
    fn clients_build() {
        assert!(authenticated_client(None, Some("k")).is_ok());
        assert!(long_lived_client(None).is_ok());
    }
}
