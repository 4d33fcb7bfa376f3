//! Best-effort retrieval of worker logs for a failed queue request.
//!
//! Four steps: resolve the worker that served the request, fetch the
//! endpoint's recent logs, pick the lines mentioning the request id, and
//! fall back to a short tail when nothing matches. Every failure degrades
//! to "no logs" — diagnostics must never turn a failed job into a second
//! error.

use std::time::Duration;

use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use serde_json::Value;

use crate::control_plane::ControlPlaneClient;
use crate::http;

/// Log lines recovered for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestLogBatch {
    pub worker_id: String,
    pub lines: Vec<String>,
    /// True when the lines were matched by request id (not a blind tail).
    pub matched_by_request_id: bool,
}

pub struct RequestLogFetcher {
    timeout: Duration,
    max_lines: usize,
    fallback_tail_lines: usize,
    lookback_minutes: i64,
}

impl Default for RequestLogFetcher {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(4),
            max_lines: 25,
            fallback_tail_lines: 10,
            lookback_minutes: 10,
        }
    }
}

impl RequestLogFetcher {
    pub fn new(timeout: Duration, max_lines: usize, fallback_tail_lines: usize) -> Self {
        Self {
            timeout,
            max_lines,
            fallback_tail_lines,
            ..Default::default()
        }
    }

    /// Fetch logs for one request. `endpoint_ai_key` is the endpoint-scoped
    /// key the logs API requires; without it only the worker id is
    /// recoverable.
    pub async fn fetch_for_request(
        &self,
        endpoint_id: &str,
        request_id: &str,
        api_key: &str,
        endpoint_ai_key: Option<&str>,
    ) -> Option<RequestLogBatch> {
        tracing::debug!(%endpoint_id, %request_id, "resolving worker for request");
        let worker_id = self
            .fetch_worker_id(endpoint_id, request_id, api_key)
            .await?;

        let Some(ai_key) = endpoint_ai_key else {
            tracing::debug!(%endpoint_id, "no endpoint key available, returning worker id only");
            return Some(RequestLogBatch {
                worker_id,
                lines: Vec::new(),
                matched_by_request_id: false,
            });
        };

        let Some(raw_lines) = self.fetch_endpoint_logs(endpoint_id, ai_key).await else {
            return Some(RequestLogBatch {
                worker_id,
                lines: Vec::new(),
                matched_by_request_id: false,
            });
        };

        let matched: Vec<String> = raw_lines
            .iter()
            .filter(|line| line.contains(request_id))
            .take(self.max_lines)
            .cloned()
            .collect();

        if !matched.is_empty() {
            return Some(RequestLogBatch {
                worker_id,
                lines: matched,
                matched_by_request_id: true,
            });
        }

        // Nothing mentioned the request id; hand back a short tail so the
        // user still sees what the worker was doing.
        let tail_start = raw_lines.len().saturating_sub(self.fallback_tail_lines);
        Some(RequestLogBatch {
            worker_id,
            lines: raw_lines[tail_start..].to_vec(),
            matched_by_request_id: false,
        })
    }

    async fn fetch_worker_id(
        &self,
        endpoint_id: &str,
        request_id: &str,
        api_key: &str,
    ) -> Option<String> {
        let client = ControlPlaneClient::new(Some(api_key)).ok()?;
        let status = client.job_status(endpoint_id, request_id).await.ok()?;
        status
            .get("workerId")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
    }

    async fn fetch_endpoint_logs(&self, endpoint_id: &str, ai_key: &str) -> Option<Vec<String>> {
        let to = Utc::now();
        let from = to - ChronoDuration::minutes(self.lookback_minutes);

        let client = http::authenticated_client(Some(self.timeout), Some(ai_key)).ok()?;
        let url = format!(
            "{}/v2/{}/logs?from={}&to={}&page=1&pageSize=100",
            crate::control_plane::REST_BASE_URL,
            endpoint_id,
            format_log_timestamp(from),
            format_log_timestamp(to),
        );

        let response = client.get(&url).send().await.ok()?;
        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "endpoint logs request rejected");
            return None;
        }
        let payload: Value = response.json().await.ok()?;
        extract_lines(&payload)
    }
}

fn format_log_timestamp(value: chrono::DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Logs arrive either as `{"logs": [{"message": …}, …]}` or a bare array.
fn extract_lines(payload: &Value) -> Option<Vec<String>> {
    let entries = payload
        .get("logs")
        .and_then(Value::as_array)
        .or_else(|| payload.as_array())?;
    Some(
        entries
            .iter()
            .filter_map(|entry| {
                entry
                    .get("message")
                    .and_then(Value::as_str)
                    .or_else(|| entry.as_str())
                    .map(String::from)
            })
            .collect(),
    )
}
