//! Peer endpoint lookup with a TTL cache.
//!
//! A container that makes cross-endpoint calls needs the URL of each peer
//! resource. The State Manager is authoritative, but it is skipped
//! entirely for terminal endpoints (the manifest says
//! `makes_remote_calls = false`), and every failure or empty answer falls
//! back to the manifest's own `resources_endpoints`. Lookups never fail —
//! at worst they return nothing and log why.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::Mutex;

use flash_client::{context, http};
use flash_domain::manifest::Manifest;
use flash_domain::env;

pub const STATE_MANAGER_URL: &str = "https://api.runpod.ai/flash/state";
const STATE_MANAGER_TIMEOUT: Duration = Duration::from_secs(4);
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[derive(Default)]
struct CacheState {
    endpoint_map: HashMap<String, String>,
    loaded_at: Option<Instant>,
}

pub struct ServiceRegistry {
    manifest: Manifest,
    ttl: Duration,
    state_manager_url: String,
    // One guard covers both the cache and the load so concurrent lookups
    // within a TTL window issue at most one State Manager query.
    cache: Mutex<CacheState>,
}

impl ServiceRegistry {
    pub fn new(manifest: Manifest) -> Self {
        Self::with_options(manifest, DEFAULT_TTL, STATE_MANAGER_URL)
    }

    pub fn with_options(
        manifest: Manifest,
        ttl: Duration,
        state_manager_url: impl Into<String>,
    ) -> Self {
        Self {
            manifest,
            ttl,
            state_manager_url: state_manager_url.into(),
            cache: Mutex::new(CacheState::default()),
        }
    }

    /// URL of a peer resource, from cache, the State Manager, or the local
    /// manifest — in that order of freshness.
    pub async fn endpoint_for(&self, name: &str) -> Option<String> {
        let mut cache = self.cache.lock().await;
        if self.needs_load(&cache) {
            self.load(&mut cache).await;
        }
        cache.endpoint_map.get(name).cloned()
    }

    /// Current cache contents (diagnostics and tests).
    pub async fn endpoint_map(&self) -> HashMap<String, String> {
        self.cache.lock().await.endpoint_map.clone()
    }

    fn needs_load(&self, cache: &CacheState) -> bool {
        match cache.loaded_at {
            None => true,
            Some(at) => at.elapsed() >= self.ttl,
        }
    }

    async fn load(&self, cache: &mut CacheState) {
        cache.loaded_at = Some(Instant::now());

        // Terminal endpoints never call peers; skip the lookup entirely.
        if let Some(current) = env::var_nonblank(env::FLASH_RESOURCE_NAME) {
            if let Some(entry) = self.manifest.resources.get(&current) {
                if !entry.makes_remote_calls {
                    tracing::debug!(resource = %current,
                        "resource makes no remote calls, skipping State Manager");
                    return;
                }
            }
        }

        match self.query_state_manager().await {
            Ok(remote) if !remote.is_empty() => {
                tracing::debug!(endpoints = remote.len(), "endpoint map from State Manager");
                cache.endpoint_map = remote;
            }
            Ok(_) => {
                tracing::debug!("State Manager returned no endpoints, using manifest");
                cache.endpoint_map = self.manifest_endpoints();
            }
            Err(e) => {
                tracing::warn!(error = %e, "State Manager unreachable, using manifest");
                cache.endpoint_map = self.manifest_endpoints();
            }
        }
    }

    fn manifest_endpoints(&self) -> HashMap<String, String> {
        self.manifest
            .resources_endpoints
            .as_ref()
            .map(|endpoints| endpoints.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    async fn query_state_manager(
        &self,
    ) -> flash_domain::Result<HashMap<String, String>> {
        let environment_id = env::var_nonblank(env::FLASH_ENVIRONMENT_ID)
            .ok_or_else(|| flash_domain::Error::Config("FLASH_ENVIRONMENT_ID not set".into()))?;
        let endpoint_id = env::var_nonblank(env::RUNPOD_ENDPOINT_ID).unwrap_or_default();
        let api_key = context::get().or_else(flash_client::credentials::get_api_key);

        let client =
            http::authenticated_client(Some(STATE_MANAGER_TIMEOUT), api_key.as_deref())?;
        let url = format!(
            "{}/environments/{}/manifest?endpointId={}",
            self.state_manager_url, environment_id, endpoint_id
        );

        // One short retry; this sits on the request path of user code.
        let mut last_error = None;
        for _ in 0..2 {
            match client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    let payload: Value = response.json().await.map_err(|e| {
                        flash_domain::Error::Http(format!("State Manager body: {e}"))
                    })?;
                    return Ok(parse_endpoints(&payload));
                }
                Ok(response) => {
                    return Err(flash_domain::Error::control_plane(
                        response.status().as_u16(),
                        response.text().await.unwrap_or_default(),
                    ))
                }
                Err(e) => last_error = Some(e),
            }
        }
        Err(flash_domain::Error::Http(format!(
            "State Manager unreachable: {}",
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}

fn parse_endpoints(payload: &Value) -> HashMap<String, String> {
    payload
        .get("resources_endpoints")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|url| (k.clone(), url.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_endpoints_reads_map() {
        let payload = json!({
            "resources_endpoints": {"a": "https://a.example.com", "b": "https://b.example.com"},
            "other": 1
        });
        let parsed = parse_endpoints(&payload);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["a"], "https://a.example.com");
    }

    #[test]
    fn parse_endpoints_tolerates_absence() {
        assert!(parse_endpoints(&json!({})).is_empty());
        assert!(parse_endpoints(&json!({"resources_endpoints": null})).is_empty());
    }
}
