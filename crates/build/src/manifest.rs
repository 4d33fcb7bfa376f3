//! Manifest construction from scanner output.
//!
//! Functions group by the resource that owns them; each group carries the
//! deploy parameters recovered from its constructor literal. A function
//! whose body calls another annotated callable marks its resource
//! `makes_remote_calls`, which later decides whether the runtime gets an
//! API key injected and whether the service registry bothers the State
//! Manager at all.

use chrono::{SecondsFormat, Utc};

use flash_domain::manifest::{Manifest, ManifestFunction, ManifestResource, MANIFEST_VERSION};
use flash_domain::{Error, Result};

use crate::calls;
use crate::scanner::ScanResult;

/// Reduce a scan into the deployment manifest.
pub fn build_manifest(project_name: &str, scan: &ScanResult) -> Result<Manifest> {
    let mut manifest = Manifest {
        version: MANIFEST_VERSION.into(),
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        project_name: project_name.to_string(),
        ..Default::default()
    };

    let all_names: Vec<&str> = scan
        .functions
        .iter()
        .map(|f| f.function_name.as_str())
        .collect();

    for function in &scan.functions {
        let resource_name = function.resource_config_name.clone();
        manifest
            .function_registry
            .insert(function.function_name.clone(), resource_name.clone());

        let entry = manifest
            .resources
            .entry(resource_name.clone())
            .or_insert_with(|| {
                let mut resource = ManifestResource::default();
                if let Some(kind) = function.resource_type {
                    resource.resource_type = kind.to_string();
                    resource.is_load_balanced = kind.is_load_balanced();
                    resource.is_live_resource = kind.is_live_resource();
                }
                if let Some(literal) = scan
                    .resources
                    .values()
                    .find(|l| l.name == resource_name)
                {
                    resource.image_name = literal.image_name.clone();
                    resource.template_id = literal.template_id.clone();
                    resource.gpu_ids = literal.gpu_ids.clone();
                    resource.workers_min = literal.workers_min;
                    resource.workers_max = literal.workers_max;
                }
                resource
            });

        entry.functions.push(ManifestFunction {
            name: function.function_name.clone(),
            module: function.module_path.clone(),
            is_async: function.is_async,
            is_class: function.is_class,
            http_method: function.http_method.clone(),
            http_path: function.http_path.clone(),
        });

        // Calls to any *other* annotated callable make this resource a
        // remote caller.
        let peers = all_names
            .iter()
            .copied()
            .filter(|n| *n != function.function_name);
        if calls::makes_remote_calls(&function.source, peers) {
            entry.makes_remote_calls = true;
        }
    }

    // Queue-style resources bind exactly one callable.
    for (name, resource) in &manifest.resources {
        if !resource.is_load_balanced && resource.functions.len() > 1 {
            let bound: Vec<&str> = resource.functions.iter().map(|f| f.name.as_str()).collect();
            return Err(Error::Config(format!(
                "queue resource '{name}' can bind only one function, got: {}",
                bound.join(", ")
            )));
        }
    }

    // Route table for LB resources.
    let mut routes = std::collections::BTreeMap::new();
    for (name, resource) in &manifest.resources {
        if !resource.is_load_balanced {
            continue;
        }
        let list: Vec<String> = resource
            .functions
            .iter()
            .filter(|f| f.is_route_handler())
            .map(|f| {
                format!(
                    "{} {}",
                    f.http_method.as_deref().unwrap_or_default(),
                    f.http_path.as_deref().unwrap_or_default()
                )
            })
            .collect();
        if !list.is_empty() {
            routes.insert(name.clone(), list);
        }
    }
    if !routes.is_empty() {
        manifest.routes = Some(routes);
    }

    manifest.validate()?;
    Ok(manifest)
}
