//! In-container runtime: job dispatch, HTTP routing, and peer endpoint
//! lookup.
//!
//! Inside a deployed container the platform hands jobs to the generic
//! handler (queue endpoints) or HTTP requests to the load-balancer app (LB
//! endpoints). Both resolve user callables through the process-wide
//! [`registry::FunctionRegistry`] side-table, populated at startup by the
//! generated handler module. The service registry answers "where does peer
//! resource X live" with a TTL cache over the State Manager, falling back
//! to the local manifest.

pub mod generic_handler;
pub mod json_bridge;
pub mod lb_handler;
pub mod manifest_loader;
pub mod provisioner;
pub mod registry;
pub mod service_registry;

pub use generic_handler::{GenericHandler, Job};
pub use lb_handler::LoadBalancerApp;
pub use registry::{FunctionRegistry, UserCallable};
pub use service_registry::ServiceRegistry;
