//! The resource manager: declared specs reconciled against the control
//! plane.
//!
//! Reconciliation is drift-driven. Each successful deploy records the
//! spec's config hash; the next `get_or_deploy` compares hashes and only
//! touches the control plane when they differ. The whole
//! read-compare-deploy-persist sequence runs under a per-key guard so
//! concurrent callers for the same key collapse into one operation, while
//! distinct keys reconcile in parallel.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use flash_domain::resources::ResourceSpec;
use flash_domain::{Error, Result};

use crate::deploy::Deployer;
use crate::store::{self, RegistryState};

/// Result of an undeploy request.
#[derive(Debug, Clone, PartialEq)]
pub struct UndeployOutcome {
    pub success: bool,
    pub message: String,
}

pub struct ResourceManager {
    state_file: PathBuf,
    state: Mutex<RegistryState>,
    deploy_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    deployer: Arc<dyn Deployer>,
}

impl ResourceManager {
    /// Load (or initialize) the registry at the default project location.
    pub fn new(deployer: Arc<dyn Deployer>) -> Self {
        Self::with_state_file(store::default_state_file(), deployer)
    }

    /// Load (or initialize) the registry at an explicit path.
    pub fn with_state_file(state_file: PathBuf, deployer: Arc<dyn Deployer>) -> Self {
        let state = match store::load(&state_file) {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(path = %state_file.display(), error = %e,
                    "failed to load resource registry, starting empty");
                RegistryState::default()
            }
        };
        tracing::debug!(
            path = %state_file.display(),
            entries = state.resources.len(),
            "resource registry loaded"
        );
        ResourceManager {
            state_file,
            state: Mutex::new(state),
            deploy_locks: Mutex::new(HashMap::new()),
            deployer,
        }
    }

    // ── Queries ────────────────────────────────────────────────────

    /// Entries whose spec carries the given user-chosen name.
    pub fn find_by_name(&self, name: &str) -> Vec<(String, ResourceSpec)> {
        self.state
            .lock()
            .resources
            .iter()
            .filter(|(_, spec)| spec.name == name)
            .map(|(k, spec)| (k.clone(), spec.clone()))
            .collect()
    }

    /// Entries whose control-plane id matches.
    pub fn find_by_provider_id(&self, id: &str) -> Vec<(String, ResourceSpec)> {
        self.state
            .lock()
            .resources
            .iter()
            .filter(|(_, spec)| spec.id.as_deref() == Some(id))
            .map(|(k, spec)| (k.clone(), spec.clone()))
            .collect()
    }

    /// Snapshot of all tracked entries.
    pub fn all(&self) -> Vec<(String, ResourceSpec)> {
        self.state
            .lock()
            .resources
            .iter()
            .map(|(k, spec)| (k.clone(), spec.clone()))
            .collect()
    }

    /// The recorded hash of the last successful deploy for a key.
    pub fn last_hash(&self, key: &str) -> Option<String> {
        self.state.lock().last_hashes.get(key).cloned()
    }

    /// Look up one entry.
    pub fn get(&self, key: &str) -> Option<ResourceSpec> {
        self.state.lock().resources.get(key).cloned()
    }

    // ── Mutations ──────────────────────────────────────────────────

    /// Record a spec without deploying it.
    pub fn register(&self, spec: &ResourceSpec) -> Result<String> {
        spec.validate()?;
        let key = spec.resource_key();
        {
            let mut state = self.state.lock();
            state.resources.insert(key.clone(), spec.clone());
        }
        self.persist()?;
        Ok(key)
    }

    /// The reconciliation loop: return the deployed spec for `spec`'s key,
    /// deploying or updating as needed.
    pub async fn get_or_deploy(&self, spec: &ResourceSpec) -> Result<ResourceSpec> {
        spec.validate()?;
        let key = spec.resource_key();
        let desired_hash = spec.config_hash();

        // Per-key single-flight guard, held across the whole sequence.
        let guard = self.key_lock(&key);
        let _held = guard.lock().await;

        let existing = {
            let state = self.state.lock();
            state
                .resources
                .get(&key)
                .cloned()
                .map(|entry| (entry, state.last_hashes.get(&key).cloned()))
        };

        if let Some((entry, last_hash)) = existing {
            if entry.is_deployed() {
                if last_hash.as_deref() == Some(desired_hash.as_str()) {
                    tracing::debug!(resource = %key, "no drift, reusing deployed endpoint");
                    return Ok(entry);
                }
                tracing::info!(resource = %key, "config drift detected, updating endpoint");
                let updated = self.deployer.update(&entry, spec).await?;
                {
                    let mut state = self.state.lock();
                    state.resources.insert(key.clone(), updated.clone());
                    state.last_hashes.insert(key.clone(), desired_hash);
                }
                self.persist()?;
                return Ok(updated);
            }
        }

        // Fresh deploy (or redeploy of an invalid entry).
        tracing::info!(resource = %key, "deploying endpoint");
        let mut fresh = spec.clone();
        match self.deployer.deploy(&mut fresh).await {
            Ok(()) => {
                let mut state = self.state.lock();
                state.resources.insert(key.clone(), fresh.clone());
                state.last_hashes.insert(key.clone(), desired_hash);
                drop(state);
                self.persist()?;
                Ok(fresh)
            }
            Err(e) => {
                // A partially created endpoint still gets recorded so a later
                // undeploy(force_remove) can clean it up.
                if fresh.id.is_some() {
                    tracing::warn!(resource = %key,
                        "deploy failed after the endpoint was created, recording for cleanup");
                    let mut state = self.state.lock();
                    state.resources.insert(key.clone(), fresh.clone());
                    drop(state);
                    let _ = self.persist();
                }
                Err(e)
            }
        }
    }

    /// Remove a resource: tear down the endpoint, then forget it.
    /// `force_remove` forgets it even when teardown fails.
    pub async fn undeploy(&self, key: &str, force_remove: bool) -> Result<UndeployOutcome> {
        let guard = self.key_lock(key);
        let _held = guard.lock().await;

        let Some(entry) = self.get(key) else {
            return Ok(UndeployOutcome {
                success: false,
                message: format!("resource '{key}' not found"),
            });
        };

        match self.deployer.undeploy(&entry).await {
            Ok(()) => {
                self.forget(key)?;
                Ok(UndeployOutcome {
                    success: true,
                    message: format!("resource '{key}' undeployed"),
                })
            }
            Err(Error::NotSupported(op)) => Ok(UndeployOutcome {
                success: false,
                message: format!("cannot undeploy '{key}': {op} is not supported"),
            }),
            Err(e) => {
                if force_remove {
                    tracing::warn!(resource = %key, error = %e,
                        "undeploy failed, removing from registry anyway");
                    self.forget(key)?;
                }
                Ok(UndeployOutcome {
                    success: false,
                    message: format!("undeploy failed: {e}"),
                })
            }
        }
    }

    // ── Internals ──────────────────────────────────────────────────

    fn key_lock(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.deploy_locks.lock();
        locks
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn forget(&self, key: &str) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.resources.remove(key);
            state.last_hashes.remove(key);
        }
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let snapshot = self.state.lock().clone();
        store::save(&self.state_file, &snapshot)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
