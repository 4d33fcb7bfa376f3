//! Queue stub: serialize the caller, submit, await, decode.
//!
//! The payload ships the caller's source with stubs for its own remote
//! references inlined (§ resolver). Assembled sources are cached per
//! (caller source digest, dependency endpoint ids) so repeated calls skip
//! the synthesis work. Submission is `POST /run` followed by status
//! polling; a remote `success = false` comes back as a remote-execution
//! error carrying the worker's message.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};

use flash_client::ControlPlaneClient;
use flash_codec::PayloadValue;
use flash_domain::backoff::{backoff_duration, BackoffStrategy};
use flash_domain::protocol::{JobRequest, JobResponse, RemoteDependency, SerializationFormat};
use flash_domain::{Error, Result};
use flash_registry::ResourceManager;
use flash_runtime::json_bridge;

use crate::resolver;
use crate::stub_registry::{AnnotatedCallable, StubRegistry};

const POLL_LIMIT: u32 = 120;

/// Process-wide cache of assembled payload sources.
static PAYLOAD_CACHE: Mutex<Option<HashMap<String, String>>> = Mutex::new(None);

pub struct QueueStub {
    record: AnnotatedCallable,
    manager: Arc<ResourceManager>,
    registry: Arc<StubRegistry>,
    /// Key the production wrapper propagates from the inbound request.
    pub api_key_override: Option<String>,
    /// Alternate REST base (local dev, tests).
    pub rest_base: Option<String>,
}

impl QueueStub {
    pub fn new(
        record: AnnotatedCallable,
        manager: Arc<ResourceManager>,
        registry: Arc<StubRegistry>,
    ) -> Self {
        Self {
            record,
            manager,
            registry,
            api_key_override: None,
            rest_base: None,
        }
    }

    /// Invoke the remote callable with already-lifted values.
    pub async fn call(
        &self,
        args: Vec<PayloadValue>,
        kwargs: Vec<(String, PayloadValue)>,
    ) -> Result<PayloadValue> {
        // Make sure the target endpoint exists before anything is encoded.
        let deployed = self.manager.get_or_deploy(&self.record.spec).await?;
        let endpoint_id = deployed
            .id
            .clone()
            .ok_or_else(|| Error::Config("deployed endpoint has no id".into()))?;

        let (function_code, dependencies) = self.assemble_source().await?;

        let request = JobRequest {
            function_name: Some(self.record.name.clone()),
            function_code: Some(function_code),
            args: encode_values(&args)?,
            kwargs: encode_named(&kwargs)?,
            dependencies: merge_deps(&self.record.dependencies, &dependencies, |d| {
                &d.dependencies
            }),
            system_dependencies: merge_deps(
                &self.record.system_dependencies,
                &dependencies,
                |d| &d.system_dependencies,
            ),
            serialization_format: SerializationFormat::Cloudpickle,
            ..Default::default()
        };

        let client = self.client()?;
        let submitted = client.run_job(&endpoint_id, &request).await?;
        let request_id = submitted
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Http("job submission returned no id".into()))?
            .to_string();
        tracing::debug!(endpoint = %endpoint_id, request = %request_id, "job submitted");

        let output = self.await_result(&client, &endpoint_id, &request_id).await?;
        decode_response(output)
    }

    /// Resolve dependencies and assemble the payload source, consulting the
    /// process-wide cache.
    async fn assemble_source(&self) -> Result<(String, Vec<RemoteDependency>)> {
        let dependencies = resolver::resolve_dependencies(
            &self.record.source,
            &self.registry,
            &self.manager,
        )
        .await?;

        let mut key_hasher = Sha256::new();
        key_hasher.update(self.record.source.as_bytes());
        for dependency in &dependencies {
            key_hasher.update(dependency.endpoint_id.as_bytes());
        }
        let cache_key = hex::encode(key_hasher.finalize());

        {
            let cache = PAYLOAD_CACHE.lock();
            if let Some(hit) = cache.as_ref().and_then(|map| map.get(&cache_key)) {
                return Ok((hit.clone(), dependencies));
            }
        }

        let (assembled, _) = resolver::prepare_payload_source(
            &self.record.source,
            &self.registry,
            &self.manager,
        )
        .await?;

        PAYLOAD_CACHE
            .lock()
            .get_or_insert_with(HashMap::new)
            .insert(cache_key, assembled.clone());
        Ok((assembled, dependencies))
    }

    async fn await_result(
        &self,
        client: &ControlPlaneClient,
        endpoint_id: &str,
        request_id: &str,
    ) -> Result<Value> {
        for attempt in 0..POLL_LIMIT {
            let status = client.job_status(endpoint_id, request_id).await?;
            match status.get("status").and_then(Value::as_str) {
                Some("COMPLETED") => {
                    return Ok(status.get("output").cloned().unwrap_or(Value::Null))
                }
                Some("FAILED") | Some("CANCELLED") | Some("TIMED_OUT") => {
                    let detail = status
                        .get("error")
                        .and_then(Value::as_str)
                        .unwrap_or("job did not complete");
                    return Err(Error::RemoteExecution(format!(
                        "request {request_id}: {detail}"
                    )));
                }
                _ => {
                    let delay = backoff_duration(
                        BackoffStrategy::Linear,
                        attempt.min(8),
                        0.25,
                        2.0,
                        0.1,
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
        Err(Error::RemoteExecution(format!(
            "request {request_id} still pending after {POLL_LIMIT} polls"
        )))
    }

    fn client(&self) -> Result<ControlPlaneClient> {
        let client = ControlPlaneClient::new(self.api_key_override.as_deref())?;
        Ok(match &self.rest_base {
            Some(base) => client.with_base_urls(format!("{base}/graphql"), base.clone()),
            None => client,
        })
    }
}

// ── Payload encoding / decoding ────────────────────────────────────

fn encode_values(values: &[PayloadValue]) -> Result<Vec<Value>> {
    flash_codec::encode_positional(values)?
        .into_iter()
        .map(|armored| Ok(Value::String(armored)))
        .collect()
}

fn encode_named(values: &[(String, PayloadValue)]) -> Result<HashMap<String, Value>> {
    Ok(flash_codec::encode_named(values)?
        .into_iter()
        .map(|(key, armored)| (key, Value::String(armored)))
        .collect())
}

fn merge_deps<'a>(
    own: &[String],
    resolved: &'a [RemoteDependency],
    pick: impl Fn(&'a RemoteDependency) -> &'a Vec<String>,
) -> Option<Vec<String>> {
    let mut merged: Vec<String> = own.to_vec();
    for dependency in resolved {
        for item in pick(dependency) {
            if !merged.contains(item) {
                merged.push(item.clone());
            }
        }
    }
    if merged.is_empty() {
        None
    } else {
        Some(merged)
    }
}

/// Parse the worker's output into a value: armored `result` wins, then
/// plain `json_result`; `success = false` surfaces the remote message.
pub fn decode_response(output: Value) -> Result<PayloadValue> {
    let response: JobResponse = serde_json::from_value(output)
        .map_err(|e| Error::Http(format!("malformed worker response: {e}")))?;

    if !response.success {
        return Err(Error::RemoteExecution(
            response
                .error
                .unwrap_or_else(|| "remote execution failed without a message".into()),
        ));
    }
    if let Some(armored) = response.result {
        return flash_codec::decode_one(&armored);
    }
    if let Some(json_result) = response.json_result {
        return Ok(json_bridge::from_json(&json_result));
    }
    Ok(PayloadValue::Null)
}
