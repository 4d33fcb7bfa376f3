//! `flash init` — scaffold a starter project.

use std::path::Path;

const GPU_WORKER: &str = r#"from runpod_flash import GpuGroup, LiveServerless, remote

gpu_config = LiveServerless(
    name="gpu_worker",
    image="runpod/flash-worker:latest",
    gpus=[GpuGroup.ADA_24],
)


@remote(resource_config=gpu_config, dependencies=["torch"])
async def gpu_hello(input_data: dict) -> dict:
    """GPU worker — detects available GPU hardware."""
    import platform

    try:
        import torch

        gpu_available = torch.cuda.is_available()
        gpu_name = torch.cuda.get_device_name(0) if gpu_available else "No GPU detected"
    except Exception as e:
        gpu_available = False
        gpu_name = f"Error: {e}"

    return {
        "message": input_data.get("message", "Hello from GPU worker!"),
        "gpu": {"available": gpu_available, "name": gpu_name},
        "platform": platform.system(),
    }
"#;

const CPU_WORKER: &str = r#"from runpod_flash import CpuLiveServerless, remote

cpu_config = CpuLiveServerless(name="cpu_worker", image="runpod/flash-worker:latest")


@remote(resource_config=cpu_config)
async def cpu_hello(input_data: dict) -> dict:
    """CPU worker — lightweight processing without GPU."""
    import platform
    from datetime import datetime

    return {
        "message": input_data.get("message", "Hello from CPU worker!"),
        "timestamp": datetime.now().isoformat(),
        "platform": platform.system(),
    }
"#;

const LB_WORKER: &str = r#"from runpod_flash import CpuLiveLoadBalancer, remote

api_config = CpuLiveLoadBalancer(
    name="lb_worker",
    image="runpod/flash-worker:latest",
    workersMin=1,
)


@remote(resource_config=api_config, method="POST", path="/process")
async def process(input_data: dict) -> dict:
    """Process input data on a load-balanced CPU endpoint."""
    from datetime import datetime

    return {
        "status": "success",
        "echo": input_data,
        "timestamp": datetime.now().isoformat(),
    }


@remote(resource_config=api_config, method="GET", path="/health")
async def health() -> dict:
    """Health check for the load-balanced endpoint."""
    return {"status": "healthy"}
"#;

const FLASHIGNORE: &str = ".flash/\n.runpod/\n.venv/\n__pycache__/\n";

pub fn run(path: &str) -> anyhow::Result<()> {
    let root = Path::new(path);
    std::fs::create_dir_all(root)?;

    let files: &[(&str, &str)] = &[
        ("gpu_worker.py", GPU_WORKER),
        ("cpu_worker.py", CPU_WORKER),
        ("lb_worker.py", LB_WORKER),
        (".flashignore", FLASHIGNORE),
    ];

    let mut written = 0usize;
    for (name, contents) in files {
        let target = root.join(name);
        if target.exists() {
            println!("  skipping {} (exists)", target.display());
            continue;
        }
        std::fs::write(&target, contents)?;
        println!("  wrote {}", target.display());
        written += 1;
    }

    if written > 0 {
        println!("\nProject scaffolded. Next steps:\n");
        println!("  flash build    # scan and generate the manifest");
        println!("  flash deploy   # create the endpoints");
        println!("  flash run gpu_hello --args '{{\"message\": \"hi\"}}'");
    }
    Ok(())
}
