//! `flash run` — invoke one deployed function and print its result.
//!
//! The target's code is already deployed with its endpoint, so the job
//! carries only the function name and plain-JSON kwargs. The endpoint id
//! comes from the local registry, deploying on demand when the resource
//! was never provisioned.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use flash_client::ControlPlaneClient;
use flash_domain::protocol::{JobRequest, SerializationFormat};
use flash_registry::{ControlPlaneDeployer, ResourceManager};
use flash_runtime::manifest_loader::load_manifest;
use flash_runtime::provisioner;
use flash_stubs::queue_stub;

pub async fn run(
    function: &str,
    args_json: &str,
    manifest_path: Option<&str>,
) -> anyhow::Result<()> {
    let manifest = load_manifest(manifest_path.map(Path::new))?;

    let resource_name = manifest
        .function_registry
        .get(function)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "function '{function}' not in manifest; known: {}",
                manifest
                    .function_registry
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })?
        .clone();
    let entry = manifest
        .resources
        .get(&resource_name)
        .ok_or_else(|| anyhow::anyhow!("resource '{resource_name}' missing from manifest"))?;
    if entry.is_load_balanced {
        anyhow::bail!(
            "'{function}' is served over HTTP; call its route on the deployed endpoint instead"
        );
    }

    let kwargs: serde_json::Map<String, Value> = serde_json::from_str(args_json)
        .map_err(|e| anyhow::anyhow!("--args must be a JSON object: {e}"))?;

    let client = ControlPlaneClient::new(None)?;
    let manager = ResourceManager::new(Arc::new(ControlPlaneDeployer::new(client)));

    // Prefer the endpoint the registry already tracks; provision otherwise.
    let deployed = match manager
        .find_by_name(&resource_name)
        .into_iter()
        .map(|(_, spec)| spec)
        .find(|spec| spec.is_deployed())
    {
        Some(spec) => spec,
        None => {
            println!("'{resource_name}' is not deployed yet; deploying …");
            let spec = provisioner::resource_from_manifest(&resource_name, entry, None)?;
            manager.get_or_deploy(&spec).await?
        }
    };
    let endpoint_id = deployed
        .id
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("endpoint for '{resource_name}' has no id"))?;

    let request = JobRequest {
        function_name: Some(function.to_string()),
        kwargs: kwargs.into_iter().collect(),
        serialization_format: SerializationFormat::Json,
        ..Default::default()
    };

    println!("Invoking '{function}' on '{resource_name}' ({endpoint_id}) …");
    let client = ControlPlaneClient::new(None)?;
    let submitted = client.run_sync(endpoint_id, &request).await?;

    // `/runsync` answers with the job envelope; the worker response is in
    // `output`.
    let request_id = submitted
        .get("id")
        .and_then(Value::as_str)
        .map(String::from);
    let output = submitted.get("output").cloned().unwrap_or(submitted);
    match queue_stub::decode_response(output) {
        Ok(value) => {
            let rendered = flash_runtime::json_bridge::to_json(&value)
                .unwrap_or_else(|_| Value::String(format!("{value:?}")));
            println!("{}", serde_json::to_string_pretty(&rendered)?);
            Ok(())
        }
        Err(e) => {
            if let Some(request_id) = request_id {
                print_worker_logs(endpoint_id, &request_id).await;
            }
            Err(e.into())
        }
    }
}

/// Best-effort worker-log tail shown under a failed invocation.
async fn print_worker_logs(endpoint_id: &str, request_id: &str) {
    let Some(api_key) = flash_client::credentials::get_api_key() else {
        return;
    };
    let fetcher = flash_client::request_logs::RequestLogFetcher::default();
    if let Some(batch) = fetcher
        .fetch_for_request(endpoint_id, request_id, &api_key, None)
        .await
    {
        eprintln!("\nworker {} served request {request_id}", batch.worker_id);
        for line in &batch.lines {
            eprintln!("  {line}");
        }
    }
}
