//! Queue-style job handler.
//!
//! The platform's job loop is synchronous: it hands over one job object
//! and expects a response dict. Async user callables are driven to
//! completion on a fresh current-thread runtime per invocation — jobs
//! never share an event loop.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;

use flash_codec::PayloadValue;
use flash_domain::protocol::{
    ExecutionType, InstanceInfo, JobRequest, JobResponse, SerializationFormat,
};
use flash_domain::{Error, Result};

use crate::json_bridge;
use crate::registry::{Args, FunctionRegistry, Kwargs, UserCallable};

/// One inbound job as the platform delivers it.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub id: String,
    pub input: JobRequest,
}

struct InstanceEntry {
    instance: Box<dyn crate::registry::ClassInstance>,
    created_at: String,
    call_count: u64,
}

pub struct GenericHandler {
    registry: Arc<FunctionRegistry>,
    instances: Mutex<HashMap<String, InstanceEntry>>,
}

impl GenericHandler {
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self {
            registry,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Entry point the generated handler wires into the platform loop.
    /// Never panics outward; every failure becomes a response.
    pub fn handle_job(&self, job: &Job) -> JobResponse {
        tracing::debug!(job = %job.id, "handling queue job");
        match self.dispatch(&job.input) {
            Ok(response) => response,
            Err(e) => JobResponse::failure(e.to_string()).with_traceback(format!("{e:?}")),
        }
    }

    fn dispatch(&self, request: &JobRequest) -> Result<JobResponse> {
        request.validate()?;
        match request.execution_type {
            ExecutionType::Function => self.dispatch_function(request),
            ExecutionType::Class => self.dispatch_class(request),
        }
    }

    // ── Function path ──────────────────────────────────────────────

    fn dispatch_function(&self, request: &JobRequest) -> Result<JobResponse> {
        let name = request.function_name.as_deref().unwrap_or_default();
        let Some(callable) = self.registry.lookup(name) else {
            return Ok(JobResponse::failure(format!(
                "Function '{name}' not found; available: {}",
                self.registry.names().join(", ")
            )));
        };

        let args = decode_args(&request.args, request.serialization_format)?;
        let kwargs = decode_kwargs(&request.kwargs, request.serialization_format)?;

        let result = match callable {
            UserCallable::Sync(f) => f(args, kwargs),
            UserCallable::Async(f) => drive(f(args, kwargs))?,
            UserCallable::Class(_) => Err(Error::Config(format!(
                "'{name}' is a class; set execution_type to \"class\""
            ))),
        };

        match result {
            Ok(value) => encode_response(&value, request.serialization_format),
            Err(e) => Ok(JobResponse::failure(e.to_string()).with_traceback(format!("{e:?}"))),
        }
    }

    // ── Class path ─────────────────────────────────────────────────

    fn dispatch_class(&self, request: &JobRequest) -> Result<JobResponse> {
        let name = request.class_name.as_deref().unwrap_or_default();
        let factory = match self.registry.lookup(name) {
            Some(UserCallable::Class(factory)) => factory,
            Some(_) => {
                return Ok(JobResponse::failure(format!(
                    "'{name}' is not a class; set execution_type to \"function\""
                )))
            }
            None => {
                return Ok(JobResponse::failure(format!(
                    "Class '{name}' not found; available: {}",
                    self.registry.names().join(", ")
                )))
            }
        };

        let instance_id = request
            .instance_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut instances = self.instances.lock();
        let reuse = !request.create_new_instance && instances.contains_key(&instance_id);
        if !reuse {
            let ctor_args =
                decode_args(&request.constructor_args, request.serialization_format)?;
            let ctor_kwargs =
                decode_kwargs(&request.constructor_kwargs, request.serialization_format)?;
            let instance = factory.construct(ctor_args, ctor_kwargs)?;
            instances.insert(
                instance_id.clone(),
                InstanceEntry {
                    instance,
                    created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                    call_count: 0,
                },
            );
        }

        let entry = instances
            .get_mut(&instance_id)
            .expect("instance inserted above");
        entry.call_count += 1;

        let args = decode_args(&request.args, request.serialization_format)?;
        let kwargs = decode_kwargs(&request.kwargs, request.serialization_format)?;
        let result = entry
            .instance
            .call_method(&request.method_name, args, kwargs);

        let info = InstanceInfo {
            created_at: entry.created_at.clone(),
            call_count: entry.call_count,
        };

        match result {
            Ok(value) => {
                let mut response = encode_response(&value, request.serialization_format)?;
                response.instance_id = Some(instance_id);
                response.instance_info = Some(info);
                Ok(response)
            }
            Err(e) => {
                let mut response =
                    JobResponse::failure(e.to_string()).with_traceback(format!("{e:?}"));
                response.instance_id = Some(instance_id);
                response.instance_info = Some(info);
                Ok(response)
            }
        }
    }
}

/// Single-function handler for pre-deployed endpoints: plain JSON kwargs
/// in, raw result (or `{error, traceback}`) out. No codec involved.
pub fn handle_deployed_job(
    registry: &FunctionRegistry,
    function_name: &str,
    kwargs: &serde_json::Map<String, Value>,
) -> Value {
    let run = || -> Result<Value> {
        let Some(callable) = registry.lookup(function_name) else {
            return Err(Error::NotFound(format!("function '{function_name}'")));
        };
        let kwargs: Kwargs = kwargs
            .iter()
            .map(|(k, v)| (k.clone(), json_bridge::from_json(v)))
            .collect();
        let result = match callable {
            UserCallable::Sync(f) => f(Vec::new(), kwargs)?,
            UserCallable::Async(f) => drive(f(Vec::new(), kwargs))??,
            UserCallable::Class(_) => {
                return Err(Error::Config(format!(
                    "'{function_name}' is a class, not a function"
                )))
            }
        };
        json_bridge::to_json(&result)
    };

    match run() {
        Ok(value) => value,
        Err(e) => serde_json::json!({
            "error": e.to_string(),
            "traceback": format!("{e:?}"),
        }),
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Drive an async user callable to completion on a fresh event loop.
fn drive<T>(fut: futures_util::future::BoxFuture<'static, T>) -> Result<T> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Config(format!("building job event loop: {e}")))?;
    Ok(runtime.block_on(fut))
}

fn decode_args(raw: &[Value], format: SerializationFormat) -> Result<Args> {
    raw.iter().map(|v| decode_value(v, format)).collect()
}

fn decode_kwargs(raw: &HashMap<String, Value>, format: SerializationFormat) -> Result<Kwargs> {
    let mut entries: Vec<(String, Value)> =
        raw.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
        .into_iter()
        .map(|(k, v)| Ok((k, decode_value(&v, format)?)))
        .collect()
}

fn decode_value(raw: &Value, format: SerializationFormat) -> Result<PayloadValue> {
    match format {
        SerializationFormat::Cloudpickle => match raw {
            Value::String(armored) => flash_codec::decode_one(armored),
            other => Err(Error::Serialization(format!(
                "expected an armored string argument, got: {other}"
            ))),
        },
        SerializationFormat::Json => Ok(json_bridge::from_json(raw)),
    }
}

fn encode_response(value: &PayloadValue, format: SerializationFormat) -> Result<JobResponse> {
    match format {
        SerializationFormat::Cloudpickle => {
            Ok(JobResponse::ok_armored(flash_codec::encode_one(value)?))
        }
        SerializationFormat::Json => Ok(JobResponse::ok_json(json_bridge::to_json(value)?)),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
