//! Static discovery of annotated callables.
//!
//! The scanner walks the project tree and parses each worker file
//! syntactically. Two shapes mark a callable for remote execution:
//!
//! * `@remote(resource_config=VAR, …)` on a function or class;
//! * `@VAR.get("/path")` / `@VAR.post("/path")` route decorators on a
//!   function, where `VAR` was assigned a resource constructor.
//!
//! Resource constructors themselves (`VAR = LiveServerless(…)`) are read
//! with the guarded literal parse — nothing in the project is imported or
//! executed. `__init__.py` files are skipped, and a `.flashignore` file
//! (project-local preferred) prunes the walk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use regex::Regex;

use flash_domain::resources::ResourceKind;
use flash_domain::{Error, Result};

use crate::literal::{self, ResourceLiteral};
use crate::paths;

pub const IGNORE_FILENAME: &str = ".flashignore";

/// Directories never worth scanning, used when the project carries no
/// ignore file of its own.
const DEFAULT_IGNORES: &[&str] = &[".flash", ".runpod", ".git", "__pycache__", ".venv", "venv"];

/// One parameter of an annotated callable.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    pub name: String,
    pub type_hint: Option<String>,
    pub default: Option<String>,
}

/// Everything discovery learns about one annotated callable.
#[derive(Debug, Clone)]
pub struct FunctionMetadata {
    pub function_name: String,
    pub module_path: String,
    pub file_path: PathBuf,
    /// The resource name this callable is bound to.
    pub resource_config_name: String,
    /// The variable holding the resource constructor, when known.
    pub config_variable: Option<String>,
    pub resource_type: Option<ResourceKind>,
    pub is_async: bool,
    pub is_class: bool,
    pub http_method: Option<String>,
    pub http_path: Option<String>,
    pub is_load_balanced: bool,
    pub is_live_resource: bool,
    pub params: Vec<ParamInfo>,
    pub dependencies: Vec<String>,
    pub system_dependencies: Vec<String>,
    /// The callable's own source, decorators excluded.
    pub source: String,
}

impl FunctionMetadata {
    /// A route handler is exactly a callable with both HTTP fields.
    pub fn is_lb_route_handler(&self) -> bool {
        self.http_method.is_some() && self.http_path.is_some()
    }
}

/// Output of a project scan.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub functions: Vec<FunctionMetadata>,
    /// Resource constructors by variable name.
    pub resources: BTreeMap<String, ResourceLiteral>,
}

pub struct ProjectScanner {
    root: PathBuf,
}

impl ProjectScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Scan the whole tree. Resource constructors are collected first so a
    /// decorator in one file can reference a variable defined in another.
    pub fn scan(&self) -> Result<ScanResult> {
        let files = self.worker_files()?;

        let mut result = ScanResult::default();
        let mut sources = Vec::with_capacity(files.len());
        for file in &files {
            let text = std::fs::read_to_string(file)?;
            for literal in find_resource_literals(&text) {
                result.resources.insert(literal.variable.clone(), literal);
            }
            sources.push(text);
        }

        for (file, text) in files.iter().zip(&sources) {
            let module = paths::file_to_module_path(file, &self.root);
            result.functions.extend(find_annotated_callables(
                text,
                file,
                &module,
                &result.resources,
            ));
        }

        tracing::debug!(
            files = files.len(),
            functions = result.functions.len(),
            resources = result.resources.len(),
            "project scan complete"
        );
        Ok(result)
    }

    fn worker_files(&self) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            return Err(Error::NotFound(format!(
                "project root {} does not exist",
                self.root.display()
            )));
        }
        // Single files are allowed (entrypoint scans).
        if self.root.is_file() {
            return Ok(vec![self.root.clone()]);
        }

        let mut walker = WalkBuilder::new(&self.root);
        walker
            .add_custom_ignore_filename(IGNORE_FILENAME)
            .hidden(false)
            .git_ignore(false);
        let mut files: Vec<PathBuf> = walker
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.extension().and_then(|e| e.to_str()) == Some("py")
                    && path.file_name().and_then(|n| n.to_str()) != Some("__init__.py")
                    && !path.components().any(|c| {
                        DEFAULT_IGNORES.contains(&c.as_os_str().to_string_lossy().as_ref())
                    })
            })
            .collect();
        files.sort();
        Ok(files)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resource constructor detection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn find_resource_literals(text: &str) -> Vec<ResourceLiteral> {
    let assignment = Regex::new(
        r"^([A-Za-z_]\w*)\s*=\s*(LiveServerless|LiveLoadBalancer|CpuLiveServerless|CpuLiveLoadBalancer|ServerlessEndpoint|CpuServerlessEndpoint|Endpoint)\s*\(",
    )
    .expect("static regex");

    let lines: Vec<&str> = text.lines().collect();
    let mut found = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        if let Some(captures) = assignment.captures(lines[i]) {
            let variable = captures.get(1).unwrap().as_str();
            let ctor = captures.get(2).unwrap().as_str();
            let open = captures.get(0).unwrap().end() - 1;
            if let Some((args, end_line)) = collect_balanced(&lines, i, open) {
                if let Some(literal) = ResourceLiteral::from_call(variable, ctor, &args) {
                    found.push(literal);
                }
                i = end_line + 1;
                continue;
            }
        }
        i += 1;
    }
    found
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Annotated callable detection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default)]
struct PendingDecorators {
    config_variable: Option<String>,
    http_method: Option<String>,
    http_path: Option<String>,
    dependencies: Vec<String>,
    system_dependencies: Vec<String>,
    seen_any: bool,
}

fn find_annotated_callables(
    text: &str,
    file: &Path,
    module: &str,
    resources: &BTreeMap<String, ResourceLiteral>,
) -> Vec<FunctionMetadata> {
    let remote_decorator = Regex::new(r"^\s*@remote\s*\(").expect("static regex");
    let route_decorator =
        Regex::new(r"^\s*@([A-Za-z_]\w*)\.(get|post|put|patch|delete)\s*\(").expect("static regex");
    let def_line =
        Regex::new(r"^(\s*)(async\s+)?def\s+([A-Za-z_]\w*)\s*\(").expect("static regex");
    let class_line = Regex::new(r"^(\s*)class\s+([A-Za-z_]\w*)").expect("static regex");

    let lines: Vec<&str> = text.lines().collect();
    let mut callables = Vec::new();
    let mut pending = PendingDecorators::default();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if remote_decorator.is_match(line) {
            let open = line.find('(').unwrap_or(line.len() - 1);
            if let Some((args, end_line)) = collect_balanced(&lines, i, open) {
                apply_remote_kwargs(&mut pending, &args);
                pending.seen_any = true;
                i = end_line + 1;
                continue;
            }
        }

        if let Some(captures) = route_decorator.captures(line) {
            let variable = captures.get(1).unwrap().as_str();
            if resources.contains_key(variable) {
                let open = captures.get(0).unwrap().end() - 1;
                if let Some((args, end_line)) = collect_balanced(&lines, i, open) {
                    pending.config_variable = Some(variable.to_string());
                    pending.http_method =
                        Some(captures.get(2).unwrap().as_str().to_uppercase());
                    pending.http_path = literal::parse_kwargs(&args)
                        .into_iter()
                        .find(|(k, _)| k.is_none())
                        .and_then(|(_, v)| literal::string_literal(&v));
                    pending.seen_any = true;
                    i = end_line + 1;
                    continue;
                }
            }
        }

        if pending.seen_any {
            if let Some(captures) = def_line.captures(line) {
                let indent = captures.get(1).unwrap().as_str().len();
                let is_async = captures.get(2).is_some();
                let name = captures.get(3).unwrap().as_str().to_string();
                let open = captures.get(0).unwrap().end() - 1;
                let (params_raw, sig_end) =
                    collect_balanced(&lines, i, open).unwrap_or((String::new(), i));
                let (source, body_end) = collect_block(&lines, i, indent, sig_end);
                callables.push(build_metadata(
                    name,
                    false,
                    is_async,
                    parse_params(&params_raw),
                    source,
                    file,
                    module,
                    std::mem::take(&mut pending),
                    resources,
                ));
                i = body_end;
                continue;
            }
            if let Some(captures) = class_line.captures(line) {
                let indent = captures.get(1).unwrap().as_str().len();
                let name = captures.get(2).unwrap().as_str().to_string();
                let ctor_params = class_constructor_params(&lines, i, indent);
                let (source, body_end) = collect_block(&lines, i, indent, i);
                callables.push(build_metadata(
                    name,
                    true,
                    false,
                    ctor_params,
                    source,
                    file,
                    module,
                    std::mem::take(&mut pending),
                    resources,
                ));
                i = body_end;
                continue;
            }
            // A stray comment or blank between decorator and target is fine;
            // anything else cancels the pending decorators.
            if !line.trim().is_empty() && !line.trim_start().starts_with('#') {
                pending = PendingDecorators::default();
            }
        }

        i += 1;
    }
    callables
}

#[allow(clippy::too_many_arguments)]
fn build_metadata(
    function_name: String,
    is_class: bool,
    is_async: bool,
    params: Vec<ParamInfo>,
    source: String,
    file: &Path,
    module: &str,
    pending: PendingDecorators,
    resources: &BTreeMap<String, ResourceLiteral>,
) -> FunctionMetadata {
    let literal = pending
        .config_variable
        .as_deref()
        .and_then(|variable| resources.get(variable));
    let resource_type = literal.map(|l| l.kind);
    let resource_config_name = literal
        .map(|l| l.name.clone())
        .or_else(|| pending.config_variable.clone())
        .unwrap_or_else(|| function_name.clone());

    FunctionMetadata {
        is_load_balanced: resource_type.map(|k| k.is_load_balanced()).unwrap_or(false),
        is_live_resource: resource_type.map(|k| k.is_live_resource()).unwrap_or(false),
        function_name,
        module_path: module.to_string(),
        file_path: file.to_path_buf(),
        resource_config_name,
        config_variable: pending.config_variable,
        resource_type,
        is_async,
        is_class,
        http_method: pending.http_method,
        http_path: pending.http_path,
        params,
        dependencies: pending.dependencies,
        system_dependencies: pending.system_dependencies,
        source,
    }
}

fn apply_remote_kwargs(pending: &mut PendingDecorators, args: &str) {
    for (key, value) in literal::parse_kwargs(args) {
        match key.as_deref() {
            Some("resource_config") if literal::is_identifier(value.trim()) => {
                pending.config_variable = Some(value.trim().to_string());
            }
            Some("method") => {
                pending.http_method = literal::string_literal(&value).map(|m| m.to_uppercase());
            }
            Some("path") => {
                pending.http_path = literal::string_literal(&value);
            }
            Some("dependencies") => {
                pending.dependencies = literal::string_list(&value);
            }
            Some("system_dependencies") => {
                pending.system_dependencies = literal::string_list(&value);
            }
            _ => {}
        }
    }
}

// ── Text block helpers ─────────────────────────────────────────────

/// Collect the text between the `(` at `(start_line, open_col)` and its
/// matching `)`, possibly spanning lines. Returns the inner text and the
/// line index of the closing paren.
fn collect_balanced(lines: &[&str], start_line: usize, open_col: usize) -> Option<(String, usize)> {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut collected = String::new();
    let mut started = false;

    for (offset, line) in lines[start_line..].iter().enumerate() {
        let start = if offset == 0 { open_col } else { 0 };
        for c in line[start..].chars() {
            if let Some(q) = quote {
                if started {
                    collected.push(c);
                }
                if c == q {
                    quote = None;
                }
                continue;
            }
            match c {
                '"' | '\'' => {
                    quote = Some(c);
                    if started {
                        collected.push(c);
                    }
                }
                '(' | '[' | '{' => {
                    depth += 1;
                    if started && !(c == '(' && depth == 1) {
                        collected.push(c);
                    }
                    started = true;
                }
                ')' | ']' | '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some((collected, start_line + offset));
                    }
                    collected.push(c);
                }
                c => {
                    if started {
                        collected.push(c);
                    }
                }
            }
        }
        if started {
            collected.push(' ');
        }
    }
    None
}

/// Collect a callable's source: the declaration plus every line indented
/// deeper than it. `sig_end` is the line where the signature closed.
fn collect_block(lines: &[&str], decl_line: usize, indent: usize, sig_end: usize) -> (String, usize) {
    let mut end = sig_end + 1;
    while end < lines.len() {
        let line = lines[end];
        if line.trim().is_empty() {
            end += 1;
            continue;
        }
        let line_indent = line.len() - line.trim_start().len();
        if line_indent <= indent {
            break;
        }
        end += 1;
    }
    // Trim trailing blank lines out of the block.
    let mut last = end;
    while last > sig_end + 1 && lines[last - 1].trim().is_empty() {
        last -= 1;
    }
    let mut source = lines[decl_line..last].join("\n");
    source.push('\n');
    (source, end)
}

/// Parameters of a class's `__init__`, when present.
fn class_constructor_params(lines: &[&str], class_line: usize, class_indent: usize) -> Vec<ParamInfo> {
    let init =
        Regex::new(r"^(\s*)def\s+__init__\s*\(").expect("static regex");
    for (offset, line) in lines[class_line + 1..].iter().enumerate() {
        if !line.trim().is_empty() {
            let indent = line.len() - line.trim_start().len();
            if indent <= class_indent {
                break;
            }
        }
        if let Some(captures) = init.captures(line) {
            let open = captures.get(0).unwrap().end() - 1;
            if let Some((raw, _)) = collect_balanced(lines, class_line + 1 + offset, open) {
                return parse_params(&raw);
            }
        }
    }
    Vec::new()
}

/// Parse a parameter list, excluding `self` and variadics.
pub fn parse_params(raw: &str) -> Vec<ParamInfo> {
    literal::split_top_level(raw, ',')
        .iter()
        .filter_map(|piece| {
            let piece = piece.trim();
            if piece.is_empty() || piece == "self" || piece.starts_with('*') {
                return None;
            }
            let (head, default) = match literal::split_top_level(piece, '=').as_slice() {
                [head] => (head.trim().to_string(), None),
                [head, default] => (head.trim().to_string(), Some(default.trim().to_string())),
                _ => return None,
            };
            let (name, type_hint) = match head.split_once(':') {
                Some((name, hint)) => (name.trim().to_string(), Some(hint.trim().to_string())),
                None => (head, None),
            };
            if !literal::is_identifier(&name) {
                return None;
            }
            Some(ParamInfo {
                name,
                type_hint,
                default,
            })
        })
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }

    const GPU_WORKER: &str = r#"from runpod_flash import GpuGroup, LiveServerless, remote

gpu_config = LiveServerless(
    name="gpu_worker",
    image="runpod/worker:latest",
    gpus=[GpuGroup.ADA_24],
    workersMin=0,
    workersMax=3,
)


@remote(resource_config=gpu_config, dependencies=["torch"])
async def gpu_hello(input_data: dict) -> dict:
    """GPU worker."""
    return {"message": input_data.get("message", "hi")}
"#;

    const LB_WORKER: &str = r#"from runpod_flash import CpuLiveLoadBalancer, remote

api_config = CpuLiveLoadBalancer(name="lb_worker", image="runpod/lb:latest", workersMin=1)


@remote(resource_config=api_config, method="POST", path="/process")
async def process(name: str, price: float, quantity: int = 1) -> dict:
    return {"total": price * quantity}


@remote(resource_config=api_config, method="GET", path="/health")
async def health() -> dict:
    return {"status": "healthy"}
"#;

    #[test]
    fn scans_queue_worker() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "gpu_worker.py", GPU_WORKER);

        let result = ProjectScanner::new(dir.path()).scan().unwrap();
        assert_eq!(result.functions.len(), 1);
        let f = &result.functions[0];
        assert_eq!(f.function_name, "gpu_hello");
        assert_eq!(f.module_path, "gpu_worker");
        assert_eq!(f.resource_config_name, "gpu_worker");
        assert_eq!(f.resource_type, Some(ResourceKind::LiveServerless));
        assert!(f.is_async);
        assert!(!f.is_class);
        assert!(!f.is_load_balanced);
        assert!(f.is_live_resource);
        assert_eq!(f.dependencies, vec!["torch"]);
        assert!(f.source.starts_with("async def gpu_hello"));
        assert!(!f.source.contains("@remote"));

        let literal = &result.resources["gpu_config"];
        assert_eq!(literal.name, "gpu_worker");
        assert_eq!(literal.gpu_ids.as_deref(), Some("ADA_24"));
        assert_eq!(literal.workers_max, Some(3));
    }

    #[test]
    fn scans_lb_routes() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "lb_worker.py", LB_WORKER);

        let result = ProjectScanner::new(dir.path()).scan().unwrap();
        assert_eq!(result.functions.len(), 2);

        let process = result
            .functions
            .iter()
            .find(|f| f.function_name == "process")
            .unwrap();
        assert_eq!(process.http_method.as_deref(), Some("POST"));
        assert_eq!(process.http_path.as_deref(), Some("/process"));
        assert!(process.is_lb_route_handler());
        assert!(process.is_load_balanced);
        assert_eq!(process.params.len(), 3);
        assert_eq!(process.params[2].name, "quantity");
        assert_eq!(process.params[2].default.as_deref(), Some("1"));
        assert_eq!(process.params[1].type_hint.as_deref(), Some("float"));

        let health = result
            .functions
            .iter()
            .find(|f| f.function_name == "health")
            .unwrap();
        assert_eq!(health.http_method.as_deref(), Some("GET"));
        assert!(health.params.is_empty());
    }

    #[test]
    fn endpoint_route_decorators() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "api.py",
            r#"from runpod_flash import Endpoint, GpuGroup

api = Endpoint(name="my-api", image="img", gpu=GpuGroup.ADA_24, workers=(1, 3))

@api.get("/health")
async def health():
    return {"status": "ok"}

@api.post("/compute")
async def compute(data):
    return data
"#,
        );

        let result = ProjectScanner::new(dir.path()).scan().unwrap();
        assert_eq!(result.functions.len(), 2);
        let health = &result.functions[0];
        assert_eq!(health.http_method.as_deref(), Some("GET"));
        assert_eq!(health.http_path.as_deref(), Some("/health"));
        assert_eq!(health.resource_config_name, "my-api");
        assert_eq!(health.resource_type, Some(ResourceKind::LiveLoadBalancer));
    }

    #[test]
    fn endpoint_without_routes_is_not_discovered() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "api.py",
            "from runpod_flash import Endpoint\n\napi = Endpoint(name=\"unused-api\")\n",
        );
        let result = ProjectScanner::new(dir.path()).scan().unwrap();
        assert!(result.functions.is_empty());
        // The constructor itself is still visible.
        assert!(result.resources.contains_key("api"));
    }

    #[test]
    fn classes_are_detected_with_constructor_params() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "embedder.py",
            r#"from runpod_flash import LiveServerless, remote

cfg = LiveServerless(name="embedder", image="img")


@remote(resource_config=cfg)
class Embedder:
    def __init__(self, model_name: str, batch_size: int = 8):
        self.model_name = model_name

    def __call__(self, text):
        return [0.0]
"#,
        );

        let result = ProjectScanner::new(dir.path()).scan().unwrap();
        assert_eq!(result.functions.len(), 1);
        let class = &result.functions[0];
        assert!(class.is_class);
        assert_eq!(class.function_name, "Embedder");
        assert_eq!(class.params.len(), 2);
        assert_eq!(class.params[0].name, "model_name");
        assert!(class.source.contains("def __call__"));
    }

    #[test]
    fn init_py_and_ignored_dirs_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "__init__.py", GPU_WORKER);
        write(dir.path(), "__pycache__/cached.py", GPU_WORKER);
        write(dir.path(), ".venv/lib/pkg.py", GPU_WORKER);
        write(dir.path(), "worker.py", GPU_WORKER);

        let result = ProjectScanner::new(dir.path()).scan().unwrap();
        assert_eq!(result.functions.len(), 1);
        assert_eq!(result.functions[0].module_path, "worker");
    }

    #[test]
    fn flashignore_prunes_the_walk() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".flashignore", "experiments/\n");
        write(dir.path(), "experiments/scratch.py", GPU_WORKER);
        write(dir.path(), "worker.py", GPU_WORKER);

        let result = ProjectScanner::new(dir.path()).scan().unwrap();
        assert_eq!(result.functions.len(), 1);
        assert_eq!(result.functions[0].module_path, "worker");
    }

    #[test]
    fn undecorated_functions_are_invisible() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "plain.py",
            "def helper(x):\n    return x\n\nasync def other(y):\n    return y\n",
        );
        let result = ProjectScanner::new(dir.path()).scan().unwrap();
        assert!(result.functions.is_empty());
    }

    #[test]
    fn nested_module_paths() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "workers/gpu/inference.py", GPU_WORKER);
        let result = ProjectScanner::new(dir.path()).scan().unwrap();
        assert_eq!(result.functions[0].module_path, "workers.gpu.inference");
    }

    #[test]
    fn multiline_decorator_arguments() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "worker.py",
            r#"from runpod_flash import LiveServerless, remote

cfg = LiveServerless(name="w", image="img")


@remote(
    resource_config=cfg,
    dependencies=["torch", "numpy"],
    system_dependencies=["ffmpeg"],
)
async def run(x):
    return x
"#,
        );
        let result = ProjectScanner::new(dir.path()).scan().unwrap();
        let f = &result.functions[0];
        assert_eq!(f.dependencies, vec!["torch", "numpy"]);
        assert_eq!(f.system_dependencies, vec!["ffmpeg"]);
    }
}
