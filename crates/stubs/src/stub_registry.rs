//! The annotation side-table.
//!
//! Decorating a callable for remote execution attaches metadata: the
//! resource spec it binds to, its extracted source, parameter names, and
//! declared package dependencies. The table is keyed by callable name and
//! plays the role of the caller's global namespace during dependency
//! resolution — a name resolves to a remote reference exactly when it has
//! an entry here.

use std::collections::HashMap;

use parking_lot::RwLock;

use flash_domain::resources::ResourceSpec;

/// Metadata attached to one annotated callable.
#[derive(Debug, Clone)]
pub struct AnnotatedCallable {
    pub name: String,
    pub spec: ResourceSpec,
    /// The callable's own source, decorators stripped.
    pub source: String,
    /// Declared parameter names, in order.
    pub params: Vec<String>,
    pub is_async: bool,
    pub http_method: Option<String>,
    pub http_path: Option<String>,
    pub dependencies: Vec<String>,
    pub system_dependencies: Vec<String>,
}

impl AnnotatedCallable {
    pub fn new(name: impl Into<String>, spec: ResourceSpec, source: impl Into<String>) -> Self {
        AnnotatedCallable {
            name: name.into(),
            spec,
            source: source.into(),
            params: Vec::new(),
            is_async: true,
            http_method: None,
            http_path: None,
            dependencies: Vec::new(),
            system_dependencies: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: &[&str]) -> Self {
        self.params = params.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_route(mut self, method: &str, path: &str) -> Self {
        self.http_method = Some(method.to_uppercase());
        self.http_path = Some(path.to_string());
        self
    }

    pub fn with_dependencies(mut self, dependencies: &[&str]) -> Self {
        self.dependencies = dependencies.iter().map(|d| d.to_string()).collect();
        self
    }
}

/// name → annotated callable, shared across the process.
#[derive(Default)]
pub struct StubRegistry {
    entries: RwLock<HashMap<String, AnnotatedCallable>>,
}

impl StubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, record: AnnotatedCallable) {
        self.entries.write().insert(record.name.clone(), record);
    }

    pub fn lookup(&self, name: &str) -> Option<AnnotatedCallable> {
        self.entries.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }
}
