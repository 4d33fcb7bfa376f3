//! On-disk registry of declared resources and the reconciliation loop that
//! keeps them matched with the control plane.
//!
//! The registry file is the source of truth for "what did we deploy and
//! with which configuration". Access is serialized two ways: an advisory
//! file lock linearizes cross-process reads/writes, and a per-key
//! single-flight guard ensures concurrent reconciliations of the same
//! resource collapse into one control-plane operation.

pub mod deploy;
pub mod file_lock;
pub mod manager;
pub mod store;

pub use deploy::{ControlPlaneDeployer, Deployer};
pub use file_lock::{FileLock, LockMode};
pub use manager::{ResourceManager, UndeployOutcome};
