//! Remote-execution protocol models.
//!
//! One [`JobRequest`] travels to a queue endpoint per invocation; the worker
//! answers with a [`JobResponse`]. Args and kwargs are either codec-armored
//! strings (`serialization_format = "pickle"`) or plain JSON values
//! (`serialization_format = "json"`); the request declares which.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// How a job executes on the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionType {
    #[default]
    Function,
    Class,
}

/// How argument values are serialized inside the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SerializationFormat {
    /// Base64-armored binary value graph (the codec's native form).
    #[default]
    Cloudpickle,
    /// Plain JSON values, no armor.
    Json,
}

/// Request for remote function or class execution.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JobRequest {
    /// Required when `execution_type` is `function`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    /// Absent when the target has its code pre-deployed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_code: Option<String>,

    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: HashMap<String, Value>,

    /// Packages installed on the worker before execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_dependencies: Option<Vec<String>>,

    #[serde(default)]
    pub execution_type: ExecutionType,

    /// Required when `execution_type` is `class`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_code: Option<String>,
    #[serde(default)]
    pub constructor_args: Vec<Value>,
    #[serde(default)]
    pub constructor_kwargs: HashMap<String, Value>,
    #[serde(default = "default_method_name")]
    pub method_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(default = "default_true")]
    pub create_new_instance: bool,

    #[serde(default = "default_true")]
    pub accelerate_downloads: bool,

    #[serde(default)]
    pub serialization_format: SerializationFormat,
}

fn default_method_name() -> String {
    "__call__".into()
}

fn default_true() -> bool {
    true
}

impl JobRequest {
    /// Enforce the execution-type field requirements. Code fields stay
    /// optional to cover pre-deployed targets.
    pub fn validate(&self) -> Result<()> {
        match self.execution_type {
            ExecutionType::Function if self.function_name.is_none() => Err(Error::Config(
                "function_name is required when execution_type is \"function\"".into(),
            )),
            ExecutionType::Class if self.class_name.is_none() => Err(Error::Config(
                "class_name is required when execution_type is \"class\"".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Metadata about a reused class instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub created_at: String,
    pub call_count: u64,
}

/// Result of a remote execution. Exactly one of `result` / `json_result` is
/// populated on success; `error` on failure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JobResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_info: Option<InstanceInfo>,
}

impl JobResponse {
    pub fn ok_armored(result: String) -> Self {
        JobResponse {
            success: true,
            result: Some(result),
            ..Default::default()
        }
    }

    pub fn ok_json(result: Value) -> Self {
        JobResponse {
            success: true,
            json_result: Some(result),
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        JobResponse {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_traceback(mut self, traceback: impl Into<String>) -> Self {
        self.traceback = Some(traceback.into());
        self
    }
}

/// A remote dependency discovered while preparing a cross-endpoint call:
/// another annotated callable the caller references by name.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDependency {
    pub name: String,
    pub endpoint_id: String,
    pub source: String,
    pub dependencies: Vec<String>,
    pub system_dependencies: Vec<String>,
}
