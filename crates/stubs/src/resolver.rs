//! Cross-endpoint dependency resolution and stub-source synthesis.
//!
//! Given a caller's source, find every direct-name call that resolves to
//! another annotated callable, make sure each target's endpoint exists
//! (deploying on demand through the resource manager), and synthesize a
//! stub function for each one. The stubs are prepended to the caller's
//! payload so the remote side can execute it in isolation; any `from X
//! import Y` line that imported an inlined name is stripped first to keep
//! the payload compilable.

use std::collections::BTreeSet;

use flash_build::calls;
use flash_domain::protocol::RemoteDependency;
use flash_domain::{Error, Result};
use flash_registry::ResourceManager;

use crate::stub_registry::StubRegistry;

/// Names in `source` that resolve to annotated callables. Only direct-name
/// calls count; attribute calls and unknown names are ignored.
pub fn detect_remote_dependencies(source: &str, registry: &StubRegistry) -> Vec<String> {
    let names = registry.names();
    calls::detect_call_names(source, names.iter().map(String::as_str))
}

/// Resolve every remote reference in `source`: deploy each target's
/// endpoint as needed and return the dependency records. Provisioning
/// failures propagate — a payload with an unprovisioned callee is useless.
pub async fn resolve_dependencies(
    source: &str,
    registry: &StubRegistry,
    manager: &ResourceManager,
) -> Result<Vec<RemoteDependency>> {
    let mut dependencies = Vec::new();
    for name in detect_remote_dependencies(source, registry) {
        let record = registry
            .lookup(&name)
            .expect("detected names come from the registry");

        let deployed = manager.get_or_deploy(&record.spec).await?;
        let endpoint_id = deployed.id.clone().ok_or_else(|| {
            Error::Config(format!("endpoint for '{name}' deployed without an id"))
        })?;

        tracing::debug!(dependency = %name, endpoint = %endpoint_id, "remote dependency resolved");
        dependencies.push(RemoteDependency {
            name,
            endpoint_id,
            source: record.source.clone(),
            dependencies: record.dependencies.clone(),
            system_dependencies: record.system_dependencies.clone(),
        });
    }
    Ok(dependencies)
}

/// Synthesize the stub function for one dependency. The generated function
/// keeps the original's parameter list, embeds its source as a string
/// literal (triple quotes escaped), and forwards the call to the embedded
/// endpoint id through the queue-submit path available inside deployed
/// containers.
pub fn generate_stub_code(dependency: &RemoteDependency, params: &[String]) -> String {
    let param_list = params.join(", ");
    let args_list = params.join(", ");
    let escaped_source = dependency.source.replace("\"\"\"", "\\\"\\\"\\\"");
    let deps = python_string_list(&dependency.dependencies);
    let system_deps = python_string_list(&dependency.system_dependencies);
    let upper = dependency.name.to_uppercase();

    format!(
        r#"_{upper}_SOURCE = """
{escaped_source}"""


async def {name}({param_list}):
    from runpod_flash.stubs import submit_remote_call

    return await submit_remote_call(
        endpoint_id="{endpoint_id}",
        function_name="{name}",
        function_source=_{upper}_SOURCE,
        dependencies={deps},
        system_dependencies={system_deps},
        args=[{args_list}],
    )
"#,
        name = dependency.name,
        endpoint_id = dependency.endpoint_id,
    )
}

/// Assemble the payload: generated stubs first, then the caller's source
/// with the now-redundant imports stripped.
pub fn build_augmented_source(original: &str, stubs: &[String]) -> String {
    if stubs.is_empty() {
        return original.to_string();
    }
    let mut out = String::new();
    for stub in stubs {
        out.push_str(stub);
        out.push('\n');
    }
    out.push_str(original);
    out
}

/// Full payload preparation for a caller: resolve, synthesize, strip, and
/// concatenate.
pub async fn prepare_payload_source(
    caller_source: &str,
    registry: &StubRegistry,
    manager: &ResourceManager,
) -> Result<(String, Vec<RemoteDependency>)> {
    let dependencies = resolve_dependencies(caller_source, registry, manager).await?;

    let inlined: BTreeSet<String> = dependencies.iter().map(|d| d.name.clone()).collect();
    let stripped = calls::strip_inlined_imports(caller_source, &inlined);

    let stubs: Vec<String> = dependencies
        .iter()
        .map(|dependency| {
            let params = registry
                .lookup(&dependency.name)
                .map(|record| record.params)
                .unwrap_or_default();
            generate_stub_code(dependency, &params)
        })
        .collect();

    Ok((build_augmented_source(&stripped, &stubs), dependencies))
}

fn python_string_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|item| format!("\"{item}\"")).collect();
    format!("[{}]", quoted.join(", "))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
