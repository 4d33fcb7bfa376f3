//! Load-balancer stub: one HTTP request to the route the callable owns.

use std::sync::Arc;

use serde_json::{Map, Value};

use flash_client::http;
use flash_domain::{Error, Result};
use flash_runtime::ServiceRegistry;

use crate::stub_registry::AnnotatedCallable;

pub struct LbStub {
    record: AnnotatedCallable,
    services: Arc<ServiceRegistry>,
    /// Key the production wrapper propagates from the inbound request.
    pub api_key_override: Option<String>,
    /// Skips the service-registry lookup (local dev, tests).
    pub base_url_override: Option<String>,
}

impl LbStub {
    pub fn new(record: AnnotatedCallable, services: Arc<ServiceRegistry>) -> Self {
        Self {
            record,
            services,
            api_key_override: None,
            base_url_override: None,
        }
    }

    /// Call the route with keyword arguments as the JSON body (for
    /// body-bearing methods). The credential context rides along as the
    /// bearer token. Returns the decoded response body.
    pub async fn call(&self, kwargs: Map<String, Value>) -> Result<Value> {
        let method = self.record.http_method.as_deref().unwrap_or("POST");
        let path = self.record.http_path.as_deref().ok_or_else(|| {
            Error::Config(format!(
                "'{}' is load-balanced but declares no route",
                self.record.name
            ))
        })?;

        let base_url = match &self.base_url_override {
            Some(base) => base.clone(),
            None => self
                .services
                .endpoint_for(&self.record.spec.name)
                .await
                .ok_or_else(|| {
                    Error::NotFound(format!(
                        "no endpoint URL known for resource '{}'",
                        self.record.spec.name
                    ))
                })?,
        };
        let url = format!("{}{}", base_url.trim_end_matches('/'), path);

        let client = http::authenticated_client(None, self.api_key_override.as_deref())?;
        let request = match method {
            "GET" => client.get(&url),
            "DELETE" => client.delete(&url),
            "PUT" => client.put(&url).json(&Value::Object(kwargs)),
            "PATCH" => client.patch(&url).json(&Value::Object(kwargs)),
            _ => client.post(&url).json(&Value::Object(kwargs)),
        };

        let response = request
            .send()
            .await
            .map_err(|e| Error::Http(format!("calling {url}: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("reading {url}: {e}")))?;

        if !status.is_success() {
            return Err(Error::RemoteExecution(format!(
                "{method} {url} returned {status}: {}",
                text.chars().take(500).collect::<String>()
            )));
        }
        serde_json::from_str(&text)
            .map_err(|e| Error::Http(format!("response from {url} was not JSON: {e}")))
    }
}
