//! Registry persistence.
//!
//! One binary blob holds the tuple `(resources, last_hashes)`. Earlier
//! releases wrote only the resources map; those files still load, with
//! `last_hashes` recomputed from each entry so the next reconcile sees a
//! known baseline (or forces an update where an entry no longer hashes).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use flash_domain::resources::ResourceSpec;
use flash_domain::{Error, Result};

use crate::file_lock::{FileLock, LockMode};

pub const STATE_DIR: &str = ".runpod";
pub const STATE_FILENAME: &str = "resources.bin";

const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// In-memory image of the registry file.
#[derive(Debug, Default, Clone)]
pub struct RegistryState {
    pub resources: HashMap<String, ResourceSpec>,
    pub last_hashes: HashMap<String, String>,
}

/// Default state-file location: `.runpod/resources.bin` under the project
/// root (the current directory).
pub fn default_state_file() -> PathBuf {
    PathBuf::from(STATE_DIR).join(STATE_FILENAME)
}

/// Load the registry under a shared lock. A missing file is an empty
/// registry; a corrupt file is reported as an error for the caller to log
/// and treat as empty.
pub fn load(path: &Path) -> Result<RegistryState> {
    if !path.exists() {
        return Ok(RegistryState::default());
    }
    let _lock = FileLock::acquire_default(path, LockMode::Shared, Some(LOCK_TIMEOUT))?;
    let bytes = std::fs::read(path)?;
    if bytes.is_empty() {
        return Ok(RegistryState::default());
    }
    decode(&bytes)
}

/// Persist the registry under an exclusive lock.
pub fn save(path: &Path, state: &RegistryState) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _lock = FileLock::acquire_default(path, LockMode::Exclusive, Some(LOCK_TIMEOUT))?;
    let blob = bincode::serialize(&(&state.resources, &state.last_hashes))
        .map_err(|e| Error::Serialization(format!("encoding registry: {e}")))?;
    std::fs::write(path, blob)?;
    Ok(())
}

fn decode(bytes: &[u8]) -> Result<RegistryState> {
    // Current form: (resources, last_hashes).
    if let Ok((resources, last_hashes)) = bincode::deserialize::<(
        HashMap<String, ResourceSpec>,
        HashMap<String, String>,
    )>(bytes)
    {
        return Ok(RegistryState {
            resources,
            last_hashes,
        });
    }

    // Legacy form: resources only.
    let resources: HashMap<String, ResourceSpec> = bincode::deserialize(bytes)
        .map_err(|e| Error::Serialization(format!("decoding registry: {e}")))?;
    let last_hashes = resources
        .iter()
        .map(|(key, spec)| (key.clone(), spec.config_hash()))
        .collect();
    tracing::debug!(
        entries = resources.len(),
        "loaded legacy registry format, recomputed config hashes"
    );
    Ok(RegistryState {
        resources,
        last_hashes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flash_domain::resources::{GpuGroup, ResourceKind};

    fn spec(name: &str) -> ResourceSpec {
        let mut spec = ResourceSpec::new(ResourceKind::LiveServerless, name);
        spec.image_name = Some("img".into());
        spec.gpus = vec![GpuGroup::ADA_24];
        spec
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = load(&dir.path().join("resources.bin")).unwrap();
        assert!(state.resources.is_empty());
        assert!(state.last_hashes.is_empty());
    }

    #[test]
    fn tuple_format_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resources.bin");

        let mut state = RegistryState::default();
        let s = spec("w");
        state.last_hashes.insert(s.resource_key(), s.config_hash());
        state.resources.insert(s.resource_key(), s);
        save(&path, &state).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.resources.len(), 1);
        assert_eq!(loaded.last_hashes, state.last_hashes);
    }

    #[test]
    fn legacy_map_only_format_loads_and_recomputes_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resources.bin");

        let s = spec("legacy");
        let key = s.resource_key();
        let expected_hash = s.config_hash();
        let mut legacy: HashMap<String, ResourceSpec> = HashMap::new();
        legacy.insert(key.clone(), s);
        std::fs::write(&path, bincode::serialize(&legacy).unwrap()).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.resources[&key].config_hash(), expected_hash);
        assert_eq!(loaded.last_hashes[&key], expected_hash);
    }

    #[test]
    fn corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resources.bin");
        std::fs::write(&path, b"corrupt").unwrap();
        assert!(matches!(load(&path), Err(Error::Serialization(_))));
    }
}
