//! End-to-end build pipeline: scan a project tree, build the manifest,
//! generate handlers, reload the manifest from disk.

use flash_build::handlers::generate_handlers;
use flash_build::{build_manifest, ProjectScanner};
use flash_domain::manifest::Manifest;

const PROJECT_MAIN: &str = r#"from runpod_flash import CpuLiveLoadBalancer, remote

from workers.gpu import gpu_infer

api_config = CpuLiveLoadBalancer(name="mothership", image="runpod/lb:latest", workersMin=1)


@remote(resource_config=api_config, method="POST", path="/classify")
async def classify(text: str) -> dict:
    return await gpu_infer({"text": text})
"#;

const PROJECT_GPU: &str = r#"from runpod_flash import GpuGroup, LiveServerless, remote

gpu_config = LiveServerless(
    name="gpu_worker",
    image="runpod/worker:latest",
    gpus=[GpuGroup.AMPERE_24],
    workersMin=0,
    workersMax=3,
)


@remote(resource_config=gpu_config, dependencies=["torch"])
async def gpu_infer(data: dict) -> dict:
    return {"result": data}
"#;

fn write(dir: &std::path::Path, name: &str, contents: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

#[test]
fn scan_build_generate_reload() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "main.py", PROJECT_MAIN);
    write(dir.path(), "workers/gpu.py", PROJECT_GPU);

    let scan = ProjectScanner::new(dir.path()).scan().unwrap();
    assert_eq!(scan.functions.len(), 2);

    let manifest = build_manifest("demo", &scan).unwrap();
    assert_eq!(manifest.function_registry["classify"], "mothership");
    assert_eq!(manifest.function_registry["gpu_infer"], "gpu_worker");
    // classify calls gpu_infer by name.
    assert!(manifest.resources["mothership"].makes_remote_calls);
    assert!(!manifest.resources["gpu_worker"].makes_remote_calls);
    // gpu_worker carries its deploy parameters from the literal.
    let gpu = &manifest.resources["gpu_worker"];
    assert_eq!(gpu.image_name.as_deref(), Some("runpod/worker:latest"));
    assert_eq!(gpu.gpu_ids.as_deref(), Some("AMPERE_24"));
    assert_eq!(gpu.workers_max, Some(3));

    let build_dir = dir.path().join(".flash/build");
    let written = generate_handlers(&manifest, &build_dir).unwrap();
    assert_eq!(written.len(), 3);

    // The gpu handler imports the function from its nested module.
    let gpu_handler =
        std::fs::read_to_string(build_dir.join("gpu_worker_handler.py")).unwrap();
    assert!(gpu_handler.contains("from workers.gpu import gpu_infer"));

    // Manifest survives a disk round-trip and revalidates.
    let manifest_path = dir.path().join(".flash/flash_manifest.json");
    manifest.save(&manifest_path).unwrap();
    let reloaded = Manifest::load(&manifest_path).unwrap();
    reloaded.validate().unwrap();
    assert_eq!(reloaded.resources.len(), 2);
}

#[test]
fn rescan_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "main.py", PROJECT_MAIN);
    write(dir.path(), "workers/gpu.py", PROJECT_GPU);

    let first = ProjectScanner::new(dir.path()).scan().unwrap();
    let second = ProjectScanner::new(dir.path()).scan().unwrap();
    let names = |scan: &flash_build::ScanResult| {
        scan.functions
            .iter()
            .map(|f| f.function_name.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(names(&first), names(&second));
}
