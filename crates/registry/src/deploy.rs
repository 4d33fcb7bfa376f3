//! Control-plane operations for each resource class.
//!
//! The manager only knows the [`Deployer`] seam; the production
//! implementation maps each [`ResourceKind`] onto the GraphQL mutations the
//! platform exposes. Live variants own their endpoint (and template, when
//! deploying from an image) and can tear both down; pre-deployed queue
//! endpoints are attached, not owned, so undeploy is refused.

use async_trait::async_trait;
use serde_json::{json, Value};

use flash_client::ControlPlaneClient;
use flash_domain::resources::{ResourceKind, ResourceSpec};
use flash_domain::{Error, Result};

/// The seam between reconciliation and the control plane.
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Create the remote endpoint; on success `spec.id` and `spec.url` are
    /// filled in. Implementations must set `spec.id` as soon as the remote
    /// object exists, even when a later step fails, so partially created
    /// endpoints stay discoverable for cleanup.
    async fn deploy(&self, spec: &mut ResourceSpec) -> Result<()>;

    /// Push the desired config onto an existing endpoint; returns the new
    /// authoritative spec.
    async fn update(&self, current: &ResourceSpec, desired: &ResourceSpec)
        -> Result<ResourceSpec>;

    /// Tear the endpoint down.
    async fn undeploy(&self, spec: &ResourceSpec) -> Result<()>;
}

/// Production deployer talking GraphQL.
pub struct ControlPlaneDeployer {
    client: ControlPlaneClient,
}

impl ControlPlaneDeployer {
    pub fn new(client: ControlPlaneClient) -> Self {
        Self { client }
    }

    /// Serverless endpoints deploy in two steps: a template carrying the
    /// image and env, then the endpoint referencing it.
    async fn create_template(&self, spec: &ResourceSpec) -> Result<String> {
        let env: Vec<Value> = spec
            .env
            .iter()
            .map(|(key, value)| json!({ "key": key, "value": value }))
            .collect();
        let data = self
            .client
            .graphql(
                r#"mutation saveTemplate($input: SaveTemplateInput) {
                    saveTemplate(input: $input) { id }
                }"#,
                json!({
                    "input": {
                        "name": format!("{}-template", spec.name),
                        "imageName": spec.image_name,
                        "env": env,
                        "isServerless": true,
                    }
                }),
            )
            .await?;
        data["saveTemplate"]["id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| Error::Http("saveTemplate returned no id".into()))
    }

    fn endpoint_input(&self, spec: &ResourceSpec, template_id: &str) -> Value {
        let mut input = json!({
            "name": endpoint_name(spec),
            "templateId": template_id,
            "workersMin": spec.workers_min,
            "workersMax": spec.workers_max,
            "scalerType": spec.scaler_type.as_str(),
            "scalerValue": spec.scaler_value,
        });
        if spec.kind.is_cpu() {
            let instance_ids: Vec<&str> =
                spec.instance_ids.iter().map(|i| i.as_str()).collect();
            input["instanceIds"] = json!(instance_ids);
        } else {
            input["gpuIds"] = json!(spec.gpu_ids());
        }
        if let Some(environment_id) = &spec.flash_environment_id {
            input["flashEnvironmentId"] = json!(environment_id);
        }
        input
    }
}

/// Flashboot is encoded as a name suffix on the wire.
fn endpoint_name(spec: &ResourceSpec) -> String {
    if spec.flashboot {
        format!("{}-fb", spec.name)
    } else {
        spec.name.clone()
    }
}

#[async_trait]
impl Deployer for ControlPlaneDeployer {
    async fn deploy(&self, spec: &mut ResourceSpec) -> Result<()> {
        match spec.kind {
            ResourceKind::ServerlessEndpoint | ResourceKind::CpuServerlessEndpoint => {
                // Pre-deployed endpoints are attached by id, not created.
                if spec.is_deployed() {
                    return Ok(());
                }
                Err(Error::Config(format!(
                    "resource '{}' references a pre-deployed endpoint but has no id",
                    spec.name
                )))
            }
            ResourceKind::LiveServerless
            | ResourceKind::LiveLoadBalancer
            | ResourceKind::CpuLiveServerless
            | ResourceKind::CpuLiveLoadBalancer => {
                let template_id = match &spec.template_id {
                    Some(id) => id.clone(),
                    None => self.create_template(spec).await?,
                };

                let data = self
                    .client
                    .graphql(
                        r#"mutation saveEndpoint($input: EndpointInput!) {
                            saveEndpoint(input: $input) { id url }
                        }"#,
                        json!({ "input": self.endpoint_input(spec, &template_id) }),
                    )
                    .await?;

                let endpoint = &data["saveEndpoint"];
                spec.id = endpoint["id"].as_str().map(String::from);
                if spec.id.is_none() {
                    return Err(Error::Http("saveEndpoint returned no id".into()));
                }
                spec.url = endpoint["url"].as_str().map(String::from).or_else(|| {
                    spec.id
                        .as_deref()
                        .map(|id| format!("https://api.runpod.ai/v2/{id}"))
                });
                tracing::info!(resource = %spec.resource_key(), id = ?spec.id, "endpoint created");
                Ok(())
            }
        }
    }

    async fn update(
        &self,
        current: &ResourceSpec,
        desired: &ResourceSpec,
    ) -> Result<ResourceSpec> {
        let id = current
            .id
            .as_deref()
            .ok_or_else(|| Error::Config("cannot update an undeployed resource".into()))?;

        let mut input = json!({
            "id": id,
            "name": endpoint_name(desired),
            "workersMin": desired.workers_min,
            "workersMax": desired.workers_max,
            "scalerType": desired.scaler_type.as_str(),
            "scalerValue": desired.scaler_value,
        });
        if desired.kind.is_cpu() {
            let instance_ids: Vec<&str> =
                desired.instance_ids.iter().map(|i| i.as_str()).collect();
            input["instanceIds"] = json!(instance_ids);
        } else {
            input["gpuIds"] = json!(desired.gpu_ids());
        }

        self.client
            .graphql(
                r#"mutation updateEndpoint($input: EndpointInput!) {
                    saveEndpoint(input: $input) { id url }
                }"#,
                json!({ "input": input }),
            )
            .await?;

        let mut updated = desired.clone();
        updated.id = current.id.clone();
        updated.url = current.url.clone();
        tracing::info!(resource = %updated.resource_key(), id, "endpoint updated");
        Ok(updated)
    }

    async fn undeploy(&self, spec: &ResourceSpec) -> Result<()> {
        match spec.kind {
            ResourceKind::ServerlessEndpoint | ResourceKind::CpuServerlessEndpoint => {
                Err(Error::NotSupported("undeploy"))
            }
            _ => {
                let id = spec
                    .id
                    .as_deref()
                    .ok_or_else(|| Error::Config("resource has no endpoint id".into()))?;
                self.client
                    .graphql(
                        r#"mutation deleteEndpoint($id: String!) {
                            deleteEndpoint(id: $id)
                        }"#,
                        json!({ "id": id }),
                    )
                    .await?;
                tracing::info!(resource = %spec.resource_key(), id, "endpoint deleted");
                Ok(())
            }
        }
    }
}
