//! Deployment manifest model.
//!
//! The manifest is written once by `flash build` and loaded read-only by
//! everything downstream: the deploy command, the runtime inside containers,
//! and the service registry. Readers must accept unknown fields so older
//! binaries keep working against newer manifests.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const MANIFEST_VERSION: &str = "1.0";
pub const MANIFEST_FILENAME: &str = "flash_manifest.json";

/// One function bound to a resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestFunction {
    pub name: String,
    pub module: String,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default)]
    pub is_class: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_path: Option<String>,
}

impl ManifestFunction {
    /// A route handler is exactly a function with both HTTP fields set.
    pub fn is_route_handler(&self) -> bool {
        self.http_method.is_some() && self.http_path.is_some()
    }
}

/// One resource's entry: its type, bound functions, and the deployment
/// parameters the provisioner needs to rebuild a spec.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ManifestResource {
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub functions: Vec<ManifestFunction>,
    #[serde(default)]
    pub is_load_balanced: bool,
    #[serde(default)]
    pub is_live_resource: bool,
    #[serde(default)]
    pub makes_remote_calls: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler_file: Option<String>,

    // Deployment parameters, wire-named like the control plane expects.
    #[serde(default, rename = "imageName", skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    #[serde(default, rename = "templateId", skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(default, rename = "gpuIds", skip_serializing_if = "Option::is_none")]
    pub gpu_ids: Option<String>,
    #[serde(default, rename = "workersMin", skip_serializing_if = "Option::is_none")]
    pub workers_min: Option<u32>,
    #[serde(default, rename = "workersMax", skip_serializing_if = "Option::is_none")]
    pub workers_max: Option<u32>,
}

/// The manifest document.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Manifest {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub generated_at: String,
    #[serde(default)]
    pub project_name: String,
    /// function name → resource name owning it.
    #[serde(default)]
    pub function_registry: BTreeMap<String, String>,
    #[serde(default)]
    pub resources: BTreeMap<String, ManifestResource>,
    /// resource name → "METHOD path" route strings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<BTreeMap<String, Vec<String>>>,
    /// resource name → deployed URL, filled in at deploy time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources_endpoints: Option<BTreeMap<String, String>>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let manifest: Manifest = serde_json::from_str(&raw)?;
        Ok(manifest)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Structural invariants:
    /// * every `function_registry` value is a key of `resources`;
    /// * `routes[r]` lists exactly the route handlers of `resources[r]`.
    pub fn validate(&self) -> Result<()> {
        for (func, resource) in &self.function_registry {
            if !self.resources.contains_key(resource) {
                return Err(Error::Config(format!(
                    "manifest: function '{func}' maps to unknown resource '{resource}'"
                )));
            }
        }
        if let Some(routes) = &self.routes {
            for (resource_name, route_list) in routes {
                let Some(resource) = self.resources.get(resource_name) else {
                    return Err(Error::Config(format!(
                        "manifest: routes reference unknown resource '{resource_name}'"
                    )));
                };
                let declared: Vec<String> = resource
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
                for route in route_list {
                    if !declared.contains(route) {
                        return Err(Error::Config(format!(
                            "manifest: route '{route}' on '{resource_name}' has no matching function"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// The resource that owns a function, if any.
    pub fn resource_for_function(&self, function_name: &str) -> Option<&ManifestResource> {
        let resource_name = self.function_registry.get(function_name)?;
        self.resources.get(resource_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Manifest {
        let mut manifest = Manifest {
            version: MANIFEST_VERSION.into(),
            generated_at: "2026-07-01T00:00:00Z".into(),
            project_name: "demo".into(),
            ..Default::default()
        };
        manifest
            .function_registry
            .insert("infer".into(), "gpu_worker".into());
        manifest.resources.insert(
            "gpu_worker".into(),
            ManifestResource {
                resource_type: "LiveServerless".into(),
                functions: vec![ManifestFunction {
                    name: "infer".into(),
                    module: "gpu_worker".into(),
                    is_async: true,
                    is_class: false,
                    http_method: None,
                    http_path: None,
                }],
                is_live_resource: true,
                ..Default::default()
            },
        );
        manifest
    }

    #[test]
    fn valid_manifest_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn registry_value_must_be_resource_key() {
        let mut manifest = sample();
        manifest
            .function_registry
            .insert("orphan".into(), "missing".into());
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn routes_must_match_declared_handlers() {
        let mut manifest = sample();
        let mut routes = BTreeMap::new();
        routes.insert("gpu_worker".into(), vec!["POST /infer".into()]);
        manifest.routes = Some(routes);
        // gpu_worker's only function has no http fields.
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn reader_accepts_unknown_fields() {
        let raw = r#"{
            "version": "1.0",
            "generated_at": "t",
            "project_name": "p",
            "function_registry": {},
            "resources": {},
            "shiny_new_field": {"a": 1}
        }"#;
        let manifest: Manifest = serde_json::from_str(raw).unwrap();
        assert_eq!(manifest.project_name, "p");
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILENAME);
        let manifest = sample();
        manifest.save(&path).unwrap();
        let loaded = Manifest::load(&path).unwrap();
        assert_eq!(loaded.function_registry, manifest.function_registry);
        assert_eq!(loaded.resources.len(), 1);
    }

    #[test]
    fn route_handler_detection() {
        let mut f = ManifestFunction {
            name: "h".into(),
            module: "m".into(),
            is_async: false,
            is_class: false,
            http_method: Some("POST".into()),
            http_path: None,
        };
        assert!(!f.is_route_handler());
        f.http_path = Some("/h".into());
        assert!(f.is_route_handler());
    }
}
