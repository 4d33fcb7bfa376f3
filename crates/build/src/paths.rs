//! Pure textual mapping between project files, module paths, resource
//! names, and URL prefixes.
//!
//! The rules are intentionally dumb: slashes become dots (modules) or stay
//! slashes (URLs); hyphens survive in URLs but become underscores wherever
//! an identifier is needed. No filesystem access happens here.

use std::path::Path;

/// `workers/gpu/inference.py` → `workers.gpu.inference`
pub fn file_to_module_path(file: &Path, root: &Path) -> String {
    relative_stem(file, root)
        .replace(['/', '\\'], ".")
        .replace('-', "_")
}

/// `workers/gpu/inference.py` → `workers_gpu_inference`
pub fn file_to_resource_name(file: &Path, root: &Path) -> String {
    relative_stem(file, root)
        .replace(['/', '\\'], "_")
        .replace('-', "_")
}

/// `workers/gpu/inference.py` → `/workers/gpu/inference`
pub fn file_to_url_prefix(file: &Path, root: &Path) -> String {
    format!("/{}", relative_stem(file, root).replace('\\', "/"))
}

fn relative_stem(file: &Path, root: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    let mut s = relative.to_string_lossy().into_owned();
    if let Some(stripped) = s.strip_suffix(".py") {
        s = stripped.to_string();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn root() -> PathBuf {
        PathBuf::from("/project")
    }

    #[test]
    fn module_path_mapping() {
        assert_eq!(
            file_to_module_path(&root().join("gpu_worker.py"), &root()),
            "gpu_worker"
        );
        assert_eq!(
            file_to_module_path(&root().join("longruns/stage1.py"), &root()),
            "longruns.stage1"
        );
        assert_eq!(
            file_to_module_path(&root().join("workers/gpu/inference.py"), &root()),
            "workers.gpu.inference"
        );
        // Hyphens are invalid in identifiers.
        assert_eq!(
            file_to_module_path(&root().join("my-worker.py"), &root()),
            "my_worker"
        );
    }

    #[test]
    fn resource_name_mapping() {
        assert_eq!(
            file_to_resource_name(&root().join("gpu_worker.py"), &root()),
            "gpu_worker"
        );
        assert_eq!(
            file_to_resource_name(&root().join("preprocess/first_pass.py"), &root()),
            "preprocess_first_pass"
        );
        assert_eq!(
            file_to_resource_name(&root().join("my-worker.py"), &root()),
            "my_worker"
        );
        let name = file_to_resource_name(&root().join("a/b/worker.py"), &root());
        assert!(!name.contains('/'));
        assert!(!name.contains(".py"));
    }

    #[test]
    fn url_prefix_mapping() {
        assert_eq!(
            file_to_url_prefix(&root().join("gpu_worker.py"), &root()),
            "/gpu_worker"
        );
        assert_eq!(
            file_to_url_prefix(&root().join("workers/gpu/inference.py"), &root()),
            "/workers/gpu/inference"
        );
        // Hyphens are fine in URLs.
        assert_eq!(
            file_to_url_prefix(&root().join("my-worker.py"), &root()),
            "/my-worker"
        );
        assert!(file_to_url_prefix(&root().join("worker.py"), &root()).starts_with('/'));
    }
}
