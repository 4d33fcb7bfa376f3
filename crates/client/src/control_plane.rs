//! GraphQL/REST client for the RunPod control plane.
//!
//! One client instance wraps one authenticated reqwest client. GraphQL
//! carries resource CRUD and the auth-request flow; REST carries job
//! submission, status polling, and endpoint logs. Transport failures are
//! retried with bounded exponential backoff; HTTP and GraphQL failures
//! surface as control-plane errors preserving the status and a truncated
//! body.

use serde_json::{json, Value};

use flash_domain::backoff::{backoff_duration, BackoffStrategy};
use flash_domain::protocol::JobRequest;
use flash_domain::{Error, Result};

use crate::{credentials, http};

pub const GRAPHQL_URL: &str = "https://api.runpod.io/graphql";
pub const REST_BASE_URL: &str = "https://api.runpod.ai";

const TRANSPORT_RETRIES: u32 = 3;

/// Authenticated control-plane session.
pub struct ControlPlaneClient {
    client: reqwest::Client,
    graphql_url: String,
    rest_base: String,
}

impl ControlPlaneClient {
    /// Short-lived session (30s timeout). Fails fast when no API key is
    /// available anywhere.
    pub fn new(api_key_override: Option<&str>) -> Result<Self> {
        if http::resolve_api_key(api_key_override).is_none() {
            return Err(Error::missing_api_key());
        }
        Ok(Self {
            client: http::authenticated_client(None, api_key_override)?,
            graphql_url: GRAPHQL_URL.into(),
            rest_base: REST_BASE_URL.into(),
        })
    }

    /// Long-lived session (300s) for bulk GraphQL operations.
    pub fn long_lived(api_key_override: Option<&str>) -> Result<Self> {
        if http::resolve_api_key(api_key_override).is_none() {
            return Err(Error::missing_api_key());
        }
        Ok(Self {
            client: http::long_lived_client(api_key_override)?,
            graphql_url: GRAPHQL_URL.into(),
            rest_base: REST_BASE_URL.into(),
        })
    }

    /// Session without credentials — only the login flow uses this. Still
    /// identifies itself with the Flash User-Agent.
    pub fn unauthenticated() -> Result<Self> {
        use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&crate::user_agent::user_agent())
                .map_err(|e| Error::Http(format!("user agent header: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(http::DEFAULT_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Http(format!("building HTTP client: {e}")))?;
        Ok(Self {
            client,
            graphql_url: GRAPHQL_URL.into(),
            rest_base: REST_BASE_URL.into(),
        })
    }

    /// Point the session at different base URLs (local dev, tests).
    pub fn with_base_urls(
        mut self,
        graphql_url: impl Into<String>,
        rest_base: impl Into<String>,
    ) -> Self {
        self.graphql_url = graphql_url.into();
        self.rest_base = rest_base.into().trim_end_matches('/').to_string();
        self
    }

    // ── GraphQL ────────────────────────────────────────────────────

    /// Execute a GraphQL operation and return its `data` field.
    pub async fn graphql(&self, query: &str, variables: Value) -> Result<Value> {
        let body = json!({ "query": query, "variables": variables });
        let response = self
            .post_with_retry(&self.graphql_url, &body)
            .await?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("reading GraphQL response: {e}")))?;

        if !status.is_success() {
            return Err(Error::control_plane(status.as_u16(), text));
        }

        let parsed: Value = serde_json::from_str(&text)
            .map_err(|e| Error::Http(format!("GraphQL response was not JSON: {e}")))?;

        if let Some(errors) = parsed.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                let detail = serde_json::to_string(errors).unwrap_or_default();
                return Err(Error::control_plane(status.as_u16(), detail));
            }
        }

        Ok(parsed.get("data").cloned().unwrap_or(Value::Null))
    }

    // ── REST: jobs ─────────────────────────────────────────────────

    /// Submit an async job: `POST /v2/{endpoint_id}/run`.
    pub async fn run_job(&self, endpoint_id: &str, input: &JobRequest) -> Result<Value> {
        let url = format!("{}/v2/{}/run", self.rest_base, endpoint_id);
        let body = json!({ "input": input });
        self.rest_json(&url, Some(&body)).await
    }

    /// Submit a job and wait for its result: `POST /v2/{endpoint_id}/runsync`.
    pub async fn run_sync(&self, endpoint_id: &str, input: &JobRequest) -> Result<Value> {
        let url = format!("{}/v2/{}/runsync", self.rest_base, endpoint_id);
        let body = json!({ "input": input });
        self.rest_json(&url, Some(&body)).await
    }

    /// Poll a submitted job: `GET /v2/{endpoint_id}/status/{request_id}`.
    pub async fn job_status(&self, endpoint_id: &str, request_id: &str) -> Result<Value> {
        let url = format!(
            "{}/v2/{}/status/{}",
            self.rest_base, endpoint_id, request_id
        );
        self.rest_json(&url, None).await
    }

    /// Fetch endpoint logs for a time window.
    pub async fn endpoint_logs(
        &self,
        endpoint_id: &str,
        from: &str,
        to: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Value> {
        let url = format!(
            "{}/v2/{}/logs?from={}&to={}&page={}&pageSize={}",
            self.rest_base, endpoint_id, from, to, page, page_size
        );
        self.rest_json(&url, None).await
    }

    // ── Internals ──────────────────────────────────────────────────

    async fn rest_json(&self, url: &str, body: Option<&Value>) -> Result<Value> {
        let response = match body {
            Some(body) => self.post_with_retry(url, body).await?,
            None => self.get_with_retry(url).await?,
        };

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("reading response: {e}")))?;

        if !status.is_success() {
            return Err(Error::control_plane(status.as_u16(), text));
        }
        serde_json::from_str(&text)
            .map_err(|e| Error::Http(format!("response was not JSON: {e}")))
    }

    async fn post_with_retry(&self, url: &str, body: &Value) -> Result<reqwest::Response> {
        self.send_with_retry(|| self.client.post(url).json(body)).await
    }

    async fn get_with_retry(&self, url: &str) -> Result<reqwest::Response> {
        self.send_with_retry(|| self.client.get(url)).await
    }

    async fn send_with_retry<F>(&self, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_error = None;
        for attempt in 0..TRANSPORT_RETRIES {
            match build().send().await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "control-plane transport error");
                    last_error = Some(e);
                    if attempt + 1 < TRANSPORT_RETRIES {
                        let delay = backoff_duration(
                            BackoffStrategy::Exponential,
                            attempt,
                            0.5,
                            8.0,
                            0.2,
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
        Err(Error::Http(format!(
            "control plane unreachable after {TRANSPORT_RETRIES} attempts: {}",
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}

/// Convenience: a client that insists on a key, with the standard hint when
/// none is found.
pub fn authenticated() -> Result<ControlPlaneClient> {
    credentials::require_api_key()?;
    ControlPlaneClient::new(None)
}
