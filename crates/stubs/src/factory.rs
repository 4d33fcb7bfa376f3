//! Stub construction.
//!
//! One polymorphic entry point maps an annotated callable to the transport
//! its resource class uses. Inside a deployed container the stub also gets
//! the production wrapper: the inbound request's API key (from the
//! credential context) is attached to the outbound call so chained
//! endpoint hops keep the original caller's identity. Wrapper attachment
//! is best-effort — with no context key the bare stub is used as-is.

use std::sync::Arc;

use serde_json::Map;

use flash_client::context;
use flash_codec::PayloadValue;
use flash_domain::resources::ResourceKind;
use flash_domain::{Error, Result};
use flash_registry::ResourceManager;
use flash_runtime::{json_bridge, ServiceRegistry};

use crate::lb_stub::LbStub;
use crate::queue_stub::QueueStub;
use crate::stub_registry::{AnnotatedCallable, StubRegistry};

/// Everything a stub needs besides the callable itself.
#[derive(Clone)]
pub struct StubContext {
    pub manager: Arc<ResourceManager>,
    pub stubs: Arc<StubRegistry>,
    pub services: Arc<ServiceRegistry>,
}

/// A client-side proxy for one annotated callable.
pub enum RemoteStub {
    Queue(QueueStub),
    LoadBalancer(LbStub),
    /// Built for records no transport can serve; calling it reports why.
    Unsupported { name: String, reason: String },
}

/// Build the stub for a record. Exhaustive over the resource class.
pub fn stub(record: &AnnotatedCallable, ctx: &StubContext) -> RemoteStub {
    let production_key = if context::is_deployed_container() {
        context::get()
    } else {
        None
    };

    match record.spec.kind {
        ResourceKind::LiveServerless
        | ResourceKind::CpuLiveServerless
        | ResourceKind::ServerlessEndpoint
        | ResourceKind::CpuServerlessEndpoint => {
            let mut queue = QueueStub::new(
                record.clone(),
                Arc::clone(&ctx.manager),
                Arc::clone(&ctx.stubs),
            );
            queue.api_key_override = production_key;
            RemoteStub::Queue(queue)
        }
        ResourceKind::LiveLoadBalancer | ResourceKind::CpuLiveLoadBalancer => {
            if record.http_path.is_none() {
                return RemoteStub::Unsupported {
                    name: record.name.clone(),
                    reason: "load-balanced callable declares no route".into(),
                };
            }
            let mut lb = LbStub::new(record.clone(), Arc::clone(&ctx.services));
            lb.api_key_override = production_key;
            RemoteStub::LoadBalancer(lb)
        }
    }
}

impl RemoteStub {
    /// Invoke the remote callable. Queue stubs take the values as-is; LB
    /// stubs need keyword arguments with JSON forms.
    pub async fn call(
        &self,
        args: Vec<PayloadValue>,
        kwargs: Vec<(String, PayloadValue)>,
    ) -> Result<PayloadValue> {
        match self {
            RemoteStub::Queue(queue) => queue.call(args, kwargs).await,
            RemoteStub::LoadBalancer(lb) => {
                let mut body = Map::new();
                for (key, value) in &kwargs {
                    body.insert(key.clone(), json_bridge::to_json(value)?);
                }
                let response = lb.call(body).await?;
                Ok(json_bridge::from_json(&response))
            }
            RemoteStub::Unsupported { name, reason } => Err(Error::Config(format!(
                "cannot call '{name}': {reason}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flash_domain::manifest::Manifest;
    use flash_domain::resources::ResourceSpec;
    use flash_registry::{ControlPlaneDeployer, ResourceManager};

    fn ctx() -> StubContext {
        let client = flash_client::ControlPlaneClient::new(Some("k")).unwrap();
        let state_dir = tempfile::tempdir().unwrap().keep();
        StubContext {
            manager: Arc::new(ResourceManager::with_state_file(
                state_dir.join("resources.bin"),
                Arc::new(ControlPlaneDeployer::new(client)),
            )),
            stubs: Arc::new(StubRegistry::new()),
            services: Arc::new(ServiceRegistry::new(Manifest::default())),
        }
    }

    #[test]
    fn queue_kinds_get_queue_stubs() {
        let ctx = ctx();
        let spec = ResourceSpec::new(ResourceKind::LiveServerless, "w");
        let record = AnnotatedCallable::new("f", spec, "async def f():\n    pass\n");
        assert!(matches!(stub(&record, &ctx), RemoteStub::Queue(_)));
    }

    #[test]
    fn lb_kinds_get_lb_stubs() {
        let ctx = ctx();
        let spec = ResourceSpec::new(ResourceKind::LiveLoadBalancer, "api");
        let record = AnnotatedCallable::new("h", spec, "async def h():\n    pass\n")
            .with_route("GET", "/health");
        assert!(matches!(stub(&record, &ctx), RemoteStub::LoadBalancer(_)));
    }

    #[tokio::test]
    async fn routeless_lb_record_fails_cleanly() {
        let ctx = ctx();
        let spec = ResourceSpec::new(ResourceKind::CpuLiveLoadBalancer, "api");
        let record = AnnotatedCallable::new("h", spec, "async def h():\n    pass\n");
        let built = stub(&record, &ctx);
        assert!(matches!(built, RemoteStub::Unsupported { .. }));
        let err = built.call(Vec::new(), Vec::new()).await.unwrap_err();
        assert!(err.to_string().contains("declares no route"));
    }
}
