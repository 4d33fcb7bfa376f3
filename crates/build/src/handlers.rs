//! Handler generation.
//!
//! One dispatch module per resource is written into the build directory:
//! queue resources get a generic-handler wiring, LB resources get route
//! bindings (plus the eval endpoint for live variants), and a dev-server
//! entry mounts every LB resource for local preview. Output is a pure
//! function of the manifest — regenerating over an existing build
//! directory yields byte-identical files.

use std::path::{Path, PathBuf};

use flash_domain::manifest::{Manifest, ManifestResource};
use flash_domain::Result;

pub const BUILD_DIR: &str = ".flash/build";
pub const DEV_SERVER_FILENAME: &str = "dev_server.py";

/// Write every handler for `manifest` into `build_dir`. Returns the
/// generated paths, resource handlers first, dev server last.
pub fn generate_handlers(manifest: &Manifest, build_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(build_dir)?;

    let mut written = Vec::new();
    for (name, resource) in &manifest.resources {
        let file = build_dir.join(format!("{name}_handler.py"));
        let contents = if resource.is_load_balanced {
            lb_handler_source(name, resource)
        } else {
            queue_handler_source(name, resource)
        };
        std::fs::write(&file, contents)?;
        written.push(file);
    }

    let dev_server = build_dir.join(DEV_SERVER_FILENAME);
    std::fs::write(&dev_server, dev_server_source(manifest))?;
    written.push(dev_server);

    tracing::debug!(files = written.len(), dir = %build_dir.display(), "handlers generated");
    Ok(written)
}

fn header(name: &str) -> String {
    format!(
        "\"\"\"Dispatch handler for `{name}`.\n\nGenerated by `flash build`. Do not edit; changes are overwritten on the\nnext build.\n\"\"\"\n"
    )
}

fn queue_handler_source(name: &str, resource: &ManifestResource) -> String {
    let mut imports = String::new();
    let mut entries = String::new();
    for function in &resource.functions {
        imports.push_str(&format!(
            "from {} import {}\n",
            function.module, function.name
        ));
        entries.push_str(&format!("        \"{0}\": {0},\n", function.name));
    }

    format!(
        r#"{header}
import runpod

{imports}from runpod_flash.runtime import GenericHandler

handler = GenericHandler(
    functions={{
{entries}    }},
)

runpod.serverless.start({{"handler": handler.handle_job}})
"#,
        header = header(name),
        imports = imports,
        entries = entries,
    )
}

fn lb_handler_source(name: &str, resource: &ManifestResource) -> String {
    let mut imports = String::new();
    let mut bindings = String::new();
    for function in &resource.functions {
        imports.push_str(&format!(
            "from {} import {}\n",
            function.module, function.name
        ));
        if let (Some(method), Some(path)) = (&function.http_method, &function.http_path) {
            bindings.push_str(&format!(
                "app.add_route(\"{method}\", \"{path}\", {})\n",
                function.name
            ));
        }
    }

    let include_eval = resource.is_live_resource;
    format!(
        r#"{header}
{imports}from runpod_flash.runtime import LoadBalancerApp

app = LoadBalancerApp(include_eval={include_eval})
{bindings}
if __name__ == "__main__":
    app.serve()
"#,
        header = header(name),
        imports = imports,
        include_eval = if include_eval { "True" } else { "False" },
        bindings = bindings,
    )
}

fn dev_server_source(manifest: &Manifest) -> String {
    let mut mounts = String::new();
    for (name, resource) in &manifest.resources {
        if resource.is_load_balanced {
            mounts.push_str(&format!(
                "server.mount(\"/{name}\", \"{name}_handler\")\n"
            ));
        }
    }

    format!(
        r#""""Local development server for `{project}`.

Generated by `flash build`. Mounts every load-balanced resource under its
resource name for local preview.
"""

from runpod_flash.runtime import DevServer

server = DevServer()
{mounts}
if __name__ == "__main__":
    server.serve()
"#,
        project = manifest.project_name,
        mounts = mounts,
    )
}
