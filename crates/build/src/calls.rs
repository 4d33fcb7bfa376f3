//! Direct-name call detection.
//!
//! A cross-endpoint call site looks like `funcB(...)` — a bare name used as
//! a call target. Attribute calls (`mod.funcB(...)`) are deliberately not
//! treated as cross-endpoint references, and neither are builtins or names
//! the caller shadows with its own parameters.

use std::collections::BTreeSet;

use regex::Regex;

const PY_BUILTINS: &[&str] = &[
    "abs", "all", "any", "bool", "bytes", "dict", "enumerate", "filter", "float",
    "format", "getattr", "hasattr", "int", "isinstance", "len", "list", "map", "max",
    "min", "next", "open", "print", "range", "repr", "round", "set", "sorted", "str",
    "sum", "super", "tuple", "type", "zip",
];

/// Names used as direct call targets in `source`, filtered to `candidates`.
/// Order follows first appearance; duplicates are collapsed.
pub fn detect_call_names<'a, I>(source: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let candidate_set: BTreeSet<&str> = candidates.into_iter().collect();
    let call_site = Regex::new(r"(^|[^\w.])([A-Za-z_]\w*)\s*\(").expect("static regex");

    let mut seen = BTreeSet::new();
    let mut found = Vec::new();
    for line in source.lines() {
        // Declarations are not call sites.
        let trimmed = line.trim_start();
        if trimmed.starts_with("def ")
            || trimmed.starts_with("async def ")
            || trimmed.starts_with("class ")
        {
            continue;
        }
        for capture in call_site.captures_iter(line) {
            let name = capture.get(2).map(|m| m.as_str()).unwrap_or_default();
            if PY_BUILTINS.contains(&name) {
                continue;
            }
            if !candidate_set.contains(name) {
                continue;
            }
            if seen.insert(name.to_string()) {
                found.push(name.to_string());
            }
        }
    }
    found
}

/// Whether `source` calls any of `candidates` directly.
pub fn makes_remote_calls<'a, I>(source: &str, candidates: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    !detect_call_names(source, candidates).is_empty()
}

/// Strip `from X import A, B` lines whose imported names are all in
/// `inlined`; drop only the inlined names when a line mixes them with
/// others. Used when those names are about to be provided as generated
/// stubs prepended to the same payload.
pub fn strip_inlined_imports(source: &str, inlined: &BTreeSet<String>) -> String {
    let import_line =
        Regex::new(r"^(\s*)from\s+[\w.]+\s+import\s+(.+?)\s*$").expect("static regex");

    let mut out = Vec::new();
    for line in source.lines() {
        if let Some(captures) = import_line.captures(line) {
            let indent = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
            let names: Vec<&str> = captures
                .get(2)
                .map(|m| m.as_str())
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .collect();
            let kept: Vec<&str> = names
                .iter()
                .copied()
                .filter(|n| {
                    // `import X as Y` keeps its line untouched unless Y is inlined.
                    let bound = n.rsplit(" as ").next().unwrap_or(n).trim();
                    !inlined.contains(bound)
                })
                .collect();
            if kept.is_empty() {
                continue; // whole line served inlined names
            }
            if kept.len() != names.len() {
                let module = line
                    .split("import")
                    .next()
                    .unwrap_or_default()
                    .trim_start_matches(indent);
                out.push(format!("{indent}{module}import {}", kept.join(", ")));
                continue;
            }
        }
        out.push(line.to_string());
    }
    let mut result = out.join("\n");
    if source.ends_with('\n') {
        result.push('\n');
    }
    result
}
