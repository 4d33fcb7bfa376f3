//! Locating and loading the deployment manifest at runtime.

use std::path::{Path, PathBuf};

use flash_domain::manifest::{Manifest, MANIFEST_FILENAME};
use flash_domain::{env, Error, Result};

/// Load the manifest, trying in order: the explicit path, the
/// `FLASH_MANIFEST_PATH` environment variable, `flash_manifest.json` in the
/// working directory, and the `.flash/` build directory.
pub fn load_manifest(explicit: Option<&Path>) -> Result<Manifest> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(path) = explicit {
        candidates.push(path.to_path_buf());
    }
    if let Some(from_env) = env::var_nonblank(env::FLASH_MANIFEST_PATH) {
        candidates.push(PathBuf::from(from_env));
    }
    candidates.push(PathBuf::from(MANIFEST_FILENAME));
    candidates.push(PathBuf::from(".flash").join(MANIFEST_FILENAME));

    for candidate in &candidates {
        if candidate.exists() {
            match Manifest::load(candidate) {
                Ok(manifest) => {
                    tracing::debug!(path = %candidate.display(), "manifest loaded");
                    return Ok(manifest);
                }
                Err(e) => {
                    tracing::warn!(path = %candidate.display(), error = %e,
                        "failed to load manifest, trying next candidate");
                }
            }
        }
    }

    Err(Error::NotFound(format!(
        "{MANIFEST_FILENAME} not found; searched: {}",
        candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        Manifest {
            project_name: "explicit".into(),
            ..Default::default()
        }
        .save(&path)
        .unwrap();

        let manifest = load_manifest(Some(&path)).unwrap();
        assert_eq!(manifest.project_name, "explicit");
    }

    #[test]
    fn missing_everywhere_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_manifest(Some(&dir.path().join("absent.json"))).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
