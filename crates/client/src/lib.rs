//! Authenticated access to the RunPod control plane.
//!
//! This crate owns everything that touches credentials or the wire:
//! credential storage and lookup, the per-request credential context used
//! for transitive propagation, the authenticated HTTP client builders, the
//! GraphQL/REST control-plane client, and the request-log fetcher used for
//! post-failure diagnostics.

pub mod context;
pub mod control_plane;
pub mod credentials;
pub mod http;
pub mod request_logs;
pub mod user_agent;

pub use control_plane::ControlPlaneClient;
