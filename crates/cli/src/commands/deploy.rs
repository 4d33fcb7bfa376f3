//! `flash deploy` — reconcile every manifest resource with the control
//! plane, then record the deployed URLs back into the manifest.

use std::path::Path;
use std::sync::Arc;

use flash_client::ControlPlaneClient;
use flash_domain::manifest::MANIFEST_FILENAME;
use flash_registry::{ControlPlaneDeployer, ResourceManager};
use flash_runtime::manifest_loader::load_manifest;
use flash_runtime::provisioner;

pub async fn run(manifest_path: Option<&str>, environment: Option<&str>) -> anyhow::Result<()> {
    let explicit = manifest_path.map(Path::new);
    let mut manifest = load_manifest(explicit)?;
    manifest.validate()?;

    let client = ControlPlaneClient::long_lived(None)?;
    let manager = Arc::new(ResourceManager::new(Arc::new(ControlPlaneDeployer::new(
        client,
    ))));

    let mut endpoints = std::collections::BTreeMap::new();
    let total = manifest.resources.len();
    for (index, (name, entry)) in manifest.resources.iter().enumerate() {
        println!("[{}/{total}] deploying '{name}' …", index + 1);
        let spec = provisioner::resource_from_manifest(name, entry, environment)?;
        let deployed = manager.get_or_deploy(&spec).await?;
        let url = deployed
            .url
            .clone()
            .or_else(|| deployed.id.as_ref().map(|id| format!("https://api.runpod.ai/v2/{id}")))
            .unwrap_or_default();
        println!("    {url}");
        endpoints.insert(name.clone(), url);
    }

    manifest.resources_endpoints = Some(endpoints);
    let save_path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| Path::new(".flash").join(MANIFEST_FILENAME));
    manifest.save(&save_path)?;
    println!("\nDeployed {total} resource{}.", crate::format::plural(total));
    Ok(())
}

/// `flash undeploy` — tear one resource down.
pub async fn undeploy(resource: &str, force: bool) -> anyhow::Result<()> {
    let client = ControlPlaneClient::new(None)?;
    let manager = ResourceManager::new(Arc::new(ControlPlaneDeployer::new(client)));

    // Accept either a full registry key or a user-facing resource name.
    let keys: Vec<String> = if manager.get(resource).is_some() {
        vec![resource.to_string()]
    } else {
        manager
            .find_by_name(resource)
            .into_iter()
            .map(|(key, _)| key)
            .collect()
    };
    if keys.is_empty() {
        anyhow::bail!("no tracked resource matches '{resource}'");
    }

    for key in keys {
        let outcome = manager.undeploy(&key, force).await?;
        if outcome.success {
            println!("{}", outcome.message);
        } else {
            eprintln!("warning: {}", outcome.message);
        }
    }
    Ok(())
}
