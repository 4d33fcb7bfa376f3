//! Lifecycle tests against a mock control plane: deploy, drift, redeploy,
//! and the legacy registry format.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use flash_client::ControlPlaneClient;
use flash_domain::resources::{GpuGroup, ResourceKind, ResourceSpec};
use flash_registry::{ControlPlaneDeployer, ResourceManager};

fn worker(workers_max: u32) -> ResourceSpec {
    let mut spec = ResourceSpec::new(ResourceKind::LiveServerless, "w");
    spec.image_name = Some("img".into());
    spec.gpus = vec![GpuGroup::ADA_24];
    spec.workers_min = 0;
    spec.workers_max = workers_max;
    spec
}

async fn deployer_for(server: &MockServer) -> ControlPlaneDeployer {
    let client = ControlPlaneClient::new(Some("test-key"))
        .unwrap()
        .with_base_urls(format!("{}/graphql", server.uri()), server.uri());
    ControlPlaneDeployer::new(client)
}

#[tokio::test]
async fn deploy_then_drift_then_update() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("saveTemplate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"saveTemplate": {"id": "tpl-1"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    // First saveEndpoint creates; the drift update reuses the same mutation
    // with an id in the input.
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("saveEndpoint"))
        .and(body_string_contains("\"id\":"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"saveEndpoint": {"id": "ep-1", "url": "https://ep-1.api.runpod.ai"}}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("saveEndpoint"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"saveEndpoint": {"id": "ep-1", "url": "https://ep-1.api.runpod.ai"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let manager = ResourceManager::with_state_file(
        dir.path().join("resources.bin"),
        Arc::new(deployer_for(&server).await),
    );

    // Deploy.
    let spec = worker(1);
    let deployed = manager.get_or_deploy(&spec).await.unwrap();
    assert_eq!(deployed.id.as_deref(), Some("ep-1"));

    // Same config: no further control-plane traffic.
    manager.get_or_deploy(&spec).await.unwrap();

    // Drift: workersMax 1 → 5 triggers exactly one update.
    let drifted = worker(5);
    let updated = manager.get_or_deploy(&drifted).await.unwrap();
    assert_eq!(updated.id.as_deref(), Some("ep-1"));
    assert_eq!(updated.workers_max, 5);
    assert_eq!(
        manager.last_hash("LiveServerless:w").as_deref(),
        Some(drifted.config_hash().as_str())
    );
}

#[tokio::test]
async fn legacy_registry_file_round_trips_into_new_manager() {
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("resources.bin");

    // Write a legacy-form file: resources map only.
    let mut deployed = worker(1);
    deployed.id = Some("ep-legacy".into());
    let key = deployed.resource_key();
    let expected_hash = deployed.config_hash();
    let mut legacy: HashMap<String, ResourceSpec> = HashMap::new();
    legacy.insert(key.clone(), deployed);
    std::fs::write(&state_file, bincode::serialize(&legacy).unwrap()).unwrap();

    // A fresh process loads it and recomputes the hash baseline.
    let server = MockServer::start().await;
    let manager =
        ResourceManager::with_state_file(state_file, Arc::new(deployer_for(&server).await));

    let entry = manager.get(&key).expect("legacy entry visible");
    assert_eq!(entry.config_hash(), expected_hash);
    assert_eq!(manager.last_hash(&key).as_deref(), Some(expected_hash.as_str()));

    // Unchanged spec ⇒ the stored entry is returned with no control-plane
    // calls at all.
    let reused = manager.get_or_deploy(&worker(1)).await.unwrap();
    assert_eq!(reused.id.as_deref(), Some("ep-legacy"));
    assert!(server.received_requests().await.unwrap().is_empty());
}
