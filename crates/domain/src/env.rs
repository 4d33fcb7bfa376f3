//! Environment-variable names the platform contracts on.
//!
//! Every variable consumed or injected anywhere in the workspace is named
//! here once, so call sites never carry string literals that can drift.

/// User API key (takes precedence over the credentials file).
pub const RUNPOD_API_KEY: &str = "RUNPOD_API_KEY";
/// Explicit override for the credentials file location.
pub const RUNPOD_CREDENTIALS_FILE: &str = "RUNPOD_CREDENTIALS_FILE";
/// Set by the platform inside serverless endpoint containers.
pub const RUNPOD_ENDPOINT_ID: &str = "RUNPOD_ENDPOINT_ID";
/// Set by the platform inside pod containers.
pub const RUNPOD_POD_ID: &str = "RUNPOD_POD_ID";

/// Local name of the resource the current container serves.
pub const FLASH_RESOURCE_NAME: &str = "FLASH_RESOURCE_NAME";
/// Environment the deployment belongs to (State Manager scope).
pub const FLASH_ENVIRONMENT_ID: &str = "FLASH_ENVIRONMENT_ID";
/// Endpoint id of the mothership that provisioned this container.
pub const FLASH_MOTHERSHIP_ID: &str = "FLASH_MOTHERSHIP_ID";
/// Explicit path to the deployment manifest.
pub const FLASH_MANIFEST_PATH: &str = "FLASH_MANIFEST_PATH";
/// Forces local-dev semantics even when platform variables are present.
pub const FLASH_IS_LIVE_PROVISIONING: &str = "FLASH_IS_LIVE_PROVISIONING";
/// Deploy-time flags that prefix resource names with "tmp-".
pub const FLASH_IS_TEST_MOTHERSHIP: &str = "FLASH_IS_TEST_MOTHERSHIP";
pub const FLASH_IS_TEST_DEPLOYMENT: &str = "FLASH_IS_TEST_DEPLOYMENT";
/// Opt-out for the passive update check.
pub const FLASH_NO_UPDATE_CHECK: &str = "FLASH_NO_UPDATE_CHECK";

/// Standard CI marker (suppresses the update check).
pub const CI: &str = "CI";
/// Log filter for the tracing subscriber.
pub const LOG_LEVEL: &str = "LOG_LEVEL";
/// XDG base directory override.
pub const XDG_CONFIG_HOME: &str = "XDG_CONFIG_HOME";

/// Read an environment variable, treating blank values as absent.
pub fn var_nonblank(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// True when the named flag is set to "true" (case-insensitive).
pub fn flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
