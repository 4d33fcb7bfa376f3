//! Service-registry behavior: the terminal-endpoint skip, the
//! empty-response fallback, and the transport-failure fallback.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use flash_domain::manifest::{Manifest, ManifestResource};
use flash_runtime::ServiceRegistry;

// Env-var driven tests share process state; serialize them.
static ENV_GUARD: Mutex<()> = Mutex::new(());

struct EnvVars(Vec<&'static str>);

impl EnvVars {
    fn set(pairs: &[(&'static str, &str)]) -> Self {
        for (name, value) in pairs {
            std::env::set_var(name, value);
        }
        EnvVars(pairs.iter().map(|(name, _)| *name).collect())
    }
}

impl Drop for EnvVars {
    fn drop(&mut self) {
        for name in &self.0 {
            std::env::remove_var(name);
        }
    }
}

fn manifest(makes_remote_calls: bool) -> Manifest {
    let mut manifest = Manifest {
        project_name: "demo".into(),
        ..Default::default()
    };
    manifest.resources.insert(
        "current".into(),
        ManifestResource {
            resource_type: "LiveServerless".into(),
            makes_remote_calls,
            ..Default::default()
        },
    );
    let mut endpoints = BTreeMap::new();
    endpoints.insert("current".to_string(), "https://local-current.example.com".to_string());
    endpoints.insert("peer".to_string(), "https://local-peer.example.com".to_string());
    manifest.resources_endpoints = Some(endpoints);
    manifest
}

#[tokio::test]
async fn terminal_endpoint_never_queries_state_manager() {
    let _guard = ENV_GUARD.lock().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/environments/.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let _env = EnvVars::set(&[
        ("FLASH_RESOURCE_NAME", "current"),
        ("FLASH_ENVIRONMENT_ID", "env-1"),
    ]);

    let registry = ServiceRegistry::with_options(
        manifest(false),
        Duration::from_secs(60),
        server.uri(),
    );

    for _ in 0..3 {
        assert_eq!(registry.endpoint_for("anything").await, None);
    }
    assert!(registry.endpoint_map().await.is_empty());
}

#[tokio::test]
async fn empty_state_manager_response_falls_back_to_manifest() {
    let _guard = ENV_GUARD.lock().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/environments/env-1/manifest.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources_endpoints": {},
            "other_key": "value"
        })))
        .mount(&server)
        .await;

    let _env = EnvVars::set(&[
        ("FLASH_RESOURCE_NAME", "current"),
        ("FLASH_ENVIRONMENT_ID", "env-1"),
        ("RUNPOD_API_KEY", "test-key"),
    ]);

    let registry = ServiceRegistry::with_options(
        manifest(true),
        Duration::from_secs(60),
        server.uri(),
    );

    assert_eq!(
        registry.endpoint_for("peer").await.as_deref(),
        Some("https://local-peer.example.com")
    );
}

#[tokio::test]
async fn state_manager_answer_is_adopted_verbatim() {
    let _guard = ENV_GUARD.lock().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/environments/env-1/manifest.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources_endpoints": {"peer": "https://fresh-peer.example.com"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let _env = EnvVars::set(&[
        ("FLASH_RESOURCE_NAME", "current"),
        ("FLASH_ENVIRONMENT_ID", "env-1"),
        ("RUNPOD_API_KEY", "test-key"),
    ]);

    let registry = ServiceRegistry::with_options(
        manifest(true),
        Duration::from_secs(60),
        server.uri(),
    );

    // Second lookup inside the TTL window reuses the cache (expect(1)).
    assert_eq!(
        registry.endpoint_for("peer").await.as_deref(),
        Some("https://fresh-peer.example.com")
    );
    assert_eq!(
        registry.endpoint_for("peer").await.as_deref(),
        Some("https://fresh-peer.example.com")
    );
}

#[tokio::test]
async fn transport_failure_falls_back_to_manifest() {
    let _guard = ENV_GUARD.lock().unwrap();
    let _env = EnvVars::set(&[
        ("FLASH_RESOURCE_NAME", "current"),
        ("FLASH_ENVIRONMENT_ID", "env-1"),
        ("RUNPOD_API_KEY", "test-key"),
    ]);

    // Nothing listens on this port.
    let registry = ServiceRegistry::with_options(
        manifest(true),
        Duration::from_secs(60),
        "http://127.0.0.1:1",
    );

    assert_eq!(
        registry.endpoint_for("current").await.as_deref(),
        Some("https://local-current.example.com")
    );
}
