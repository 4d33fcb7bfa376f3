//! Resource descriptors.
//!
//! A [`ResourceSpec`] is the typed configuration for one remote endpoint
//! class. The original platform modeled these as a class hierarchy; here the
//! variant lives in a single authoritative [`ResourceKind`] tag and every
//! behavioral difference is an exhaustive match on it.
//!
//! Identity contract:
//! * `config_hash()` — deterministic digest over all configured fields,
//!   excluding `id` and `url`. Two specs with equal hashes are
//!   interchangeable.
//! * `resource_id()` — `"<Kind>_<md5>"`, stable across the whole lifecycle.
//! * `resource_key()` — `"<Kind>:<name>"` for named specs, the unit of
//!   registry identity.

use std::collections::BTreeMap;
use std::fmt;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Kind tag
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The resource class. This is the single source of truth for how a spec
/// deploys, dispatches, and stubs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// GPU queue-backed serverless endpoint, code shipped per call.
    LiveServerless,
    /// GPU load-balanced HTTP endpoint.
    LiveLoadBalancer,
    /// CPU queue-backed serverless endpoint.
    CpuLiveServerless,
    /// CPU load-balanced HTTP endpoint.
    CpuLiveLoadBalancer,
    /// Queue endpoint with pre-deployed code (image carries the handler).
    ServerlessEndpoint,
    /// CPU variant of [`ResourceKind::ServerlessEndpoint`].
    CpuServerlessEndpoint,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::LiveServerless => "LiveServerless",
            ResourceKind::LiveLoadBalancer => "LiveLoadBalancer",
            ResourceKind::CpuLiveServerless => "CpuLiveServerless",
            ResourceKind::CpuLiveLoadBalancer => "CpuLiveLoadBalancer",
            ResourceKind::ServerlessEndpoint => "ServerlessEndpoint",
            ResourceKind::CpuServerlessEndpoint => "CpuServerlessEndpoint",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "LiveServerless" => ResourceKind::LiveServerless,
            "LiveLoadBalancer" => ResourceKind::LiveLoadBalancer,
            "CpuLiveServerless" => ResourceKind::CpuLiveServerless,
            "CpuLiveLoadBalancer" => ResourceKind::CpuLiveLoadBalancer,
            "ServerlessEndpoint" => ResourceKind::ServerlessEndpoint,
            "CpuServerlessEndpoint" => ResourceKind::CpuServerlessEndpoint,
            _ => return None,
        })
    }

    /// LB variants bind HTTP routes directly.
    pub fn is_load_balanced(&self) -> bool {
        matches!(
            self,
            ResourceKind::LiveLoadBalancer | ResourceKind::CpuLiveLoadBalancer
        )
    }

    /// Live variants receive code with each request (no pre-deployed handler).
    pub fn is_live_resource(&self) -> bool {
        matches!(
            self,
            ResourceKind::LiveServerless
                | ResourceKind::LiveLoadBalancer
                | ResourceKind::CpuLiveServerless
                | ResourceKind::CpuLiveLoadBalancer
        )
    }

    pub fn is_cpu(&self) -> bool {
        matches!(
            self,
            ResourceKind::CpuLiveServerless
                | ResourceKind::CpuLiveLoadBalancer
                | ResourceKind::CpuServerlessEndpoint
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GPU / CPU profiles
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// GPU pools selectable for a serverless endpoint, named by architecture and
/// VRAM size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum GpuGroup {
    AMPERE_16,
    AMPERE_24,
    AMPERE_48,
    AMPERE_80,
    ADA_24,
    ADA_48_PRO,
    ADA_80_PRO,
    HOPPER_141,
    BLACKWELL_96,
    BLACKWELL_180,
}

impl GpuGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            GpuGroup::AMPERE_16 => "AMPERE_16",
            GpuGroup::AMPERE_24 => "AMPERE_24",
            GpuGroup::AMPERE_48 => "AMPERE_48",
            GpuGroup::AMPERE_80 => "AMPERE_80",
            GpuGroup::ADA_24 => "ADA_24",
            GpuGroup::ADA_48_PRO => "ADA_48_PRO",
            GpuGroup::ADA_80_PRO => "ADA_80_PRO",
            GpuGroup::HOPPER_141 => "HOPPER_141",
            GpuGroup::BLACKWELL_96 => "BLACKWELL_96",
            GpuGroup::BLACKWELL_180 => "BLACKWELL_180",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "AMPERE_16" => GpuGroup::AMPERE_16,
            "AMPERE_24" => GpuGroup::AMPERE_24,
            "AMPERE_48" => GpuGroup::AMPERE_48,
            "AMPERE_80" => GpuGroup::AMPERE_80,
            "ADA_24" => GpuGroup::ADA_24,
            "ADA_48_PRO" => GpuGroup::ADA_48_PRO,
            "ADA_80_PRO" => GpuGroup::ADA_80_PRO,
            "HOPPER_141" => GpuGroup::HOPPER_141,
            "BLACKWELL_96" => GpuGroup::BLACKWELL_96,
            "BLACKWELL_180" => GpuGroup::BLACKWELL_180,
            _ => return None,
        })
    }

    /// Join pools into the comma-separated `gpuIds` wire string.
    pub fn to_gpu_ids_str(groups: &[GpuGroup]) -> String {
        groups
            .iter()
            .map(|g| g.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parse a `gpuIds` wire string, ignoring negated ("-"-prefixed) and
    /// unknown tokens.
    pub fn from_gpu_ids_str(s: &str) -> Vec<GpuGroup> {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty() && !t.starts_with('-'))
            .filter_map(GpuGroup::parse)
            .collect()
    }
}

/// CPU instance flavors (generation, vCPUs, RAM GB).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum CpuInstanceType {
    CPU3G_1_4,
    CPU3G_2_8,
    CPU3G_4_16,
    CPU3G_8_32,
    CPU5C_1_2,
    CPU5C_2_4,
    CPU5C_4_8,
}

impl CpuInstanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CpuInstanceType::CPU3G_1_4 => "cpu3g-1-4",
            CpuInstanceType::CPU3G_2_8 => "cpu3g-2-8",
            CpuInstanceType::CPU3G_4_16 => "cpu3g-4-16",
            CpuInstanceType::CPU3G_8_32 => "cpu3g-8-32",
            CpuInstanceType::CPU5C_1_2 => "cpu5c-1-2",
            CpuInstanceType::CPU5C_2_4 => "cpu5c-2-4",
            CpuInstanceType::CPU5C_4_8 => "cpu5c-4-8",
        }
    }
}

/// Scaling signal for queue-backed endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ScalerType {
    #[default]
    #[serde(rename = "QUEUE_DELAY")]
    QueueDelay,
    #[serde(rename = "REQUEST_COUNT")]
    RequestCount,
}

impl ScalerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalerType::QueueDelay => "QUEUE_DELAY",
            ScalerType::RequestCount => "REQUEST_COUNT",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resource spec
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Typed configuration for one remote endpoint.
///
/// Immutable after [`ResourceSpec::validate`] passes, except for the
/// deployment outputs `id` and `url` which the control plane assigns and
/// which never participate in identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub kind: ResourceKind,
    pub name: String,

    /// Exactly one of `image_name` / `template_id` for deployable variants.
    #[serde(default)]
    pub image_name: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,

    /// Environment injected into the endpoint container. Ordered so the
    /// config hash is stable.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub gpus: Vec<GpuGroup>,
    #[serde(default)]
    pub instance_ids: Vec<CpuInstanceType>,

    #[serde(default)]
    pub workers_min: u32,
    #[serde(default = "default_workers_max")]
    pub workers_max: u32,

    #[serde(default)]
    pub scaler_type: ScalerType,
    #[serde(default = "default_scaler_value")]
    pub scaler_value: u32,

    #[serde(default)]
    pub flashboot: bool,

    #[serde(default)]
    pub flash_environment_id: Option<String>,

    /// Control-plane endpoint id, set after a successful deploy.
    #[serde(default)]
    pub id: Option<String>,
    /// Public base URL, set after a successful deploy.
    #[serde(default)]
    pub url: Option<String>,
}

fn default_workers_max() -> u32 {
    3
}

fn default_scaler_value() -> u32 {
    4
}

impl ResourceSpec {
    /// Start a spec with the defaults the platform assumes.
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        ResourceSpec {
            kind,
            name: name.into(),
            image_name: None,
            template_id: None,
            env: BTreeMap::new(),
            gpus: Vec::new(),
            instance_ids: Vec::new(),
            workers_min: 0,
            workers_max: default_workers_max(),
            scaler_type: ScalerType::default(),
            scaler_value: default_scaler_value(),
            flashboot: false,
            flash_environment_id: None,
            id: None,
            url: None,
        }
    }

    /// Check the construction invariants.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config("resource name must not be empty".into()));
        }
        if self.workers_min > self.workers_max {
            return Err(Error::Config(format!(
                "workers_min ({}) must not exceed workers_max ({})",
                self.workers_min, self.workers_max
            )));
        }
        match (&self.image_name, &self.template_id) {
            (Some(_), Some(_)) => {
                return Err(Error::Config(
                    "imageName and templateId are mutually exclusive".into(),
                ))
            }
            (None, None) => {
                return Err(Error::Config(format!(
                    "resource '{}' requires imageName or templateId",
                    self.name
                )))
            }
            _ => {}
        }
        if self.kind.is_cpu() && !self.gpus.is_empty() {
            return Err(Error::Config(format!(
                "CPU resource '{}' cannot select GPU pools",
                self.name
            )));
        }
        Ok(())
    }

    /// True once the control plane has assigned an endpoint id.
    pub fn is_deployed(&self) -> bool {
        self.id.as_deref().map(|s| !s.is_empty()).unwrap_or(false)
    }

    /// Canonical JSON of the hashed fields: every config field except the
    /// deployment outputs. BTreeMap ordering plus struct field order make
    /// this deterministic.
    fn hashed_fields_json(&self) -> String {
        let mut value = serde_json::to_value(self).expect("spec serializes");
        let obj = value.as_object_mut().expect("spec is an object");
        obj.remove("id");
        obj.remove("url");
        // Canonicalize key order.
        let sorted: BTreeMap<String, serde_json::Value> =
            obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        serde_json::to_string(&sorted).expect("canonical form serializes")
    }

    /// Deterministic digest over the configured fields; `id`/`url` never
    /// participate.
    pub fn config_hash(&self) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.hashed_fields_json().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Stable identity: `"<Kind>_<config digest>"`.
    pub fn resource_id(&self) -> String {
        format!("{}_{}", self.kind, self.config_hash())
    }

    /// Registry identity: `"<Kind>:<name>"` when named, else the resource id.
    pub fn resource_key(&self) -> String {
        if self.name.trim().is_empty() {
            self.resource_id()
        } else {
            format!("{}:{}", self.kind, self.name)
        }
    }

    /// The `gpuIds` wire string, empty for CPU variants.
    pub fn gpu_ids(&self) -> String {
        GpuGroup::to_gpu_ids_str(&self.gpus)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn gpu_spec(name: &str) -> ResourceSpec {
        let mut spec = ResourceSpec::new(ResourceKind::LiveServerless, name);
        spec.image_name = Some("runpod/worker:latest".into());
        spec.gpus = vec![GpuGroup::ADA_24];
        spec
    }

    #[test]
    fn config_hash_is_deterministic() {
        assert_eq!(gpu_spec("w").config_hash(), gpu_spec("w").config_hash());
    }

    #[test]
    fn config_hash_ignores_id_and_url() {
        let mut a = gpu_spec("w");
        let mut b = gpu_spec("w");
        a.id = Some("ep-1".into());
        b.id = Some("ep-2".into());
        b.url = Some("https://ep-2.example.com".into());
        assert_eq!(a.config_hash(), b.config_hash());
    }

    #[test]
    fn config_hash_changes_with_any_field() {
        let base = gpu_spec("w");
        let mut workers = gpu_spec("w");
        workers.workers_max = 9;
        let mut env = gpu_spec("w");
        env.env.insert("A".into(), "1".into());
        let mut flash = gpu_spec("w");
        flash.flashboot = true;

        assert_ne!(base.config_hash(), workers.config_hash());
        assert_ne!(base.config_hash(), env.config_hash());
        assert_ne!(base.config_hash(), flash.config_hash());
    }

    #[test]
    fn resource_id_stable_across_deploy() {
        let mut spec = gpu_spec("w");
        let before = spec.resource_id();
        spec.id = Some("ep-123".into());
        assert_eq!(before, spec.resource_id());
        assert!(before.starts_with("LiveServerless_"));
        assert_eq!(before.len(), "LiveServerless_".len() + 32);
    }

    #[test]
    fn resource_key_uses_kind_and_name() {
        assert_eq!(gpu_spec("worker").resource_key(), "LiveServerless:worker");
    }

    #[test]
    fn validate_rejects_empty_name() {
        let spec = gpu_spec("  ");
        assert!(matches!(spec.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn validate_rejects_min_over_max() {
        let mut spec = gpu_spec("w");
        spec.workers_min = 5;
        spec.workers_max = 1;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn validate_accepts_zero_workers() {
        let mut spec = gpu_spec("w");
        spec.workers_min = 0;
        spec.workers_max = 0;
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn validate_requires_image_or_template() {
        let spec = ResourceSpec::new(ResourceKind::LiveServerless, "w");
        assert!(spec.validate().is_err());

        let mut both = gpu_spec("w");
        both.template_id = Some("tpl-1".into());
        assert!(both.validate().is_err());
    }

    #[test]
    fn kind_derivations() {
        assert!(ResourceKind::LiveLoadBalancer.is_load_balanced());
        assert!(ResourceKind::LiveLoadBalancer.is_live_resource());
        assert!(!ResourceKind::ServerlessEndpoint.is_live_resource());
        assert!(ResourceKind::CpuLiveServerless.is_cpu());
        assert!(!ResourceKind::CpuLiveServerless.is_load_balanced());
    }

    #[test]
    fn gpu_ids_round_trip() {
        let groups = vec![GpuGroup::AMPERE_48, GpuGroup::AMPERE_24];
        let s = GpuGroup::to_gpu_ids_str(&groups);
        assert_eq!(s, "AMPERE_48,AMPERE_24");
        assert_eq!(GpuGroup::from_gpu_ids_str(&s), groups);
    }

    #[test]
    fn gpu_ids_ignores_negations_and_unknowns() {
        let parsed = GpuGroup::from_gpu_ids_str("AMPERE_24,-NVIDIA L4,MYSTERY_GPU");
        assert_eq!(parsed, vec![GpuGroup::AMPERE_24]);
    }

    #[test]
    fn specs_with_equal_hash_are_interchangeable() {
        let a = gpu_spec("w");
        let b = gpu_spec("w");
        assert_eq!(a.config_hash(), b.config_hash());
        assert_eq!(a.resource_key(), b.resource_key());
    }
}
