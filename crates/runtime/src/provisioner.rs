//! Rebuilding deployable specs from manifest entries.
//!
//! `flash deploy` provisions every resource the manifest names. Each entry
//! is turned back into a [`ResourceSpec`] carrying the environment the
//! child container needs: its own resource name, the environment id for
//! State Manager queries, the mothership's endpoint id when one exists,
//! and — only for resources that make remote calls — the deploying user's
//! API key.

use std::collections::HashMap;

use flash_domain::manifest::{Manifest, ManifestResource};
use flash_domain::resources::{GpuGroup, ResourceKind, ResourceSpec};
use flash_domain::{env, Error, Result};

/// Build the deployable spec for one manifest entry.
pub fn resource_from_manifest(
    resource_name: &str,
    entry: &ManifestResource,
    flash_environment_id: Option<&str>,
) -> Result<ResourceSpec> {
    let kind = ResourceKind::parse(&entry.resource_type).ok_or_else(|| {
        Error::Config(format!(
            "unsupported resource type for auto-provisioning: {}",
            entry.resource_type
        ))
    })?;

    // Test deployments run under throwaway names.
    let is_test = env::flag(env::FLASH_IS_TEST_MOTHERSHIP) || env::flag(env::FLASH_IS_TEST_DEPLOYMENT);
    let name = if is_test && !resource_name.starts_with("tmp-") {
        let prefixed = format!("tmp-{resource_name}");
        tracing::info!(resource = %resource_name, "test mode: using temporary name '{prefixed}'");
        prefixed
    } else {
        resource_name.to_string()
    };

    let mut spec = ResourceSpec::new(kind, name);
    spec.image_name = entry.image_name.clone();
    spec.template_id = entry.template_id.clone();
    if let Some(gpu_ids) = &entry.gpu_ids {
        spec.gpus = GpuGroup::from_gpu_ids_str(gpu_ids);
    }
    if let Some(min) = entry.workers_min {
        spec.workers_min = min;
    }
    if let Some(max) = entry.workers_max {
        spec.workers_max = max;
    }
    spec.flash_environment_id = flash_environment_id.map(String::from);

    spec.env
        .insert(env::FLASH_RESOURCE_NAME.into(), resource_name.to_string());
    if let Some(environment_id) = flash_environment_id {
        spec.env
            .insert(env::FLASH_ENVIRONMENT_ID.into(), environment_id.to_string());
    }
    // Only set when provisioning runs inside a mothership container; the
    // CLI path has no endpoint id of its own.
    if let Some(mothership_id) = env::var_nonblank(env::RUNPOD_ENDPOINT_ID) {
        spec.env
            .insert(env::FLASH_MOTHERSHIP_ID.into(), mothership_id);
    }
    // Children that call peers need a key to do it with.
    if entry.makes_remote_calls {
        if let Some(api_key) = env::var_nonblank(env::RUNPOD_API_KEY) {
            spec.env.insert(env::RUNPOD_API_KEY.into(), api_key);
        }
    }

    spec.validate()?;
    Ok(spec)
}

/// Drop cached registry entries the manifest no longer names (or whose
/// type changed). Stale entries appear after refactors; deploying them
/// would resurrect deleted endpoints.
pub fn filter_resources_by_manifest(
    cached: HashMap<String, ResourceSpec>,
    manifest: &Manifest,
) -> HashMap<String, ResourceSpec> {
    let mut removed = 0usize;
    let filtered: HashMap<String, ResourceSpec> = cached
        .into_iter()
        .filter(|(key, spec)| {
            let Some(entry) = manifest.resources.get(&spec.name) else {
                tracing::info!(resource = %spec.name, key = %key,
                    "removing stale cached resource (not in current manifest)");
                removed += 1;
                return false;
            };
            if !entry.resource_type.is_empty() && entry.resource_type != spec.kind.to_string() {
                tracing::warn!(resource = %spec.name,
                    cached = %spec.kind, manifest = %entry.resource_type,
                    "removing stale cached resource (type mismatch)");
                removed += 1;
                return false;
            }
            true
        })
        .collect();
    if removed > 0 {
        tracing::info!(removed, "cache validation removed stale resources");
    }
    filtered
}
