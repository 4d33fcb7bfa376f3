//! Guarded evaluation of resource-descriptor literals.
//!
//! `gpu = LiveServerless(name="gpu_worker", gpus=[GpuGroup.ADA_24])` is a
//! constructor call in the project's source. The deploy parameters inside
//! it are recovered with a purely syntactic parse of the keyword
//! arguments — strings, numbers, booleans, enum attributes, and shallow
//! lists/tuples. Project code is never imported or executed.

use flash_domain::resources::{GpuGroup, ResourceKind};

/// A resource constructor found in source, reduced to its deploy
/// parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceLiteral {
    /// The variable the constructor was assigned to.
    pub variable: String,
    pub kind: ResourceKind,
    /// The user-chosen resource name (falls back to the variable name).
    pub name: String,
    pub image_name: Option<String>,
    pub template_id: Option<String>,
    pub gpu_ids: Option<String>,
    pub workers_min: Option<u32>,
    pub workers_max: Option<u32>,
}

impl ResourceLiteral {
    /// Interpret one constructor call. `ctor` is the called name
    /// (`LiveServerless`, …, or `Endpoint`); `args` is the raw text between
    /// its parentheses.
    pub fn from_call(variable: &str, ctor: &str, args: &str) -> Option<ResourceLiteral> {
        let kwargs = parse_kwargs(args);
        let get = |key: &str| {
            kwargs
                .iter()
                .find(|(k, _)| k.as_deref() == Some(key))
                .map(|(_, v)| v.as_str())
        };

        let kind = match ctor {
            "Endpoint" => {
                // The endpoint shorthand resolves to an LB variant by
                // hardware profile.
                if get("cpu").is_some() {
                    ResourceKind::CpuLiveLoadBalancer
                } else {
                    ResourceKind::LiveLoadBalancer
                }
            }
            other => ResourceKind::parse(other)?,
        };

        let name = get("name")
            .and_then(string_literal)
            .unwrap_or_else(|| variable.to_string());

        let (mut workers_min, mut workers_max) = (None, None);
        if let Some(pair) = get("workers").and_then(u32_pair) {
            workers_min = Some(pair.0);
            workers_max = Some(pair.1);
        }
        if let Some(n) = get("workersMin").or(get("workers_min")).and_then(u32_literal) {
            workers_min = Some(n);
        }
        if let Some(n) = get("workersMax").or(get("workers_max")).and_then(u32_literal) {
            workers_max = Some(n);
        }

        Some(ResourceLiteral {
            variable: variable.to_string(),
            kind,
            name,
            image_name: get("imageName")
                .or(get("image_name"))
                .or(get("image"))
                .and_then(string_literal),
            template_id: get("templateId")
                .or(get("template_id"))
                .and_then(string_literal),
            gpu_ids: get("gpus").or(get("gpu")).map(gpu_tokens),
            workers_min,
            workers_max,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Argument-text parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Split the argument text into `(keyword, raw value)` pairs. Positional
/// arguments get a `None` keyword.
pub fn parse_kwargs(args: &str) -> Vec<(Option<String>, String)> {
    split_top_level(args, ',')
        .into_iter()
        .filter(|piece| !piece.trim().is_empty())
        .map(|piece| {
            let piece = piece.trim();
            // `key=value` — but not `==` or a default inside a lambda.
            if let Some(eq) = find_top_level(piece, '=') {
                let (key, value) = piece.split_at(eq);
                let key = key.trim();
                if is_identifier(key) {
                    return (Some(key.to_string()), value[1..].trim().to_string());
                }
            }
            (None, piece.to_string())
        })
        .collect()
}

/// Split `input` on `separator` at nesting depth zero, respecting quotes
/// and brackets.
pub fn split_top_level(input: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in input.chars() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(c);
            }
            c if c == separator && depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

fn find_top_level(input: &str, needle: char) -> Option<usize> {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let chars: Vec<char> = input.chars().collect();
    let mut byte = 0usize;
    for (i, &c) in chars.iter().enumerate() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
        } else {
            match c {
                '"' | '\'' => quote = Some(c),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                c if c == needle && depth == 0 => {
                    // Reject `==`.
                    if chars.get(i + 1) == Some(&'=') || (i > 0 && chars[i - 1] == '=') {
                        byte += c.len_utf8();
                        continue;
                    }
                    return Some(byte);
                }
                _ => {}
            }
        }
        byte += c.len_utf8();
    }
    None
}

pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Unquote a string literal.
pub fn string_literal(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let bytes = raw.as_bytes();
    if raw.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[raw.len() - 1] == bytes[0]
    {
        return Some(raw[1..raw.len() - 1].to_string());
    }
    None
}

/// Parse a list of string literals: `["torch", "numpy"]`.
pub fn string_list(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    let inner = raw
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(raw);
    split_top_level(inner, ',')
        .iter()
        .filter_map(|item| string_literal(item))
        .collect()
}

fn u32_literal(raw: &str) -> Option<u32> {
    raw.trim().parse().ok()
}

fn u32_pair(raw: &str) -> Option<(u32, u32)> {
    let raw = raw.trim();
    let inner = raw
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .or_else(|| raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')))?;
    let parts = split_top_level(inner, ',');
    if parts.len() != 2 {
        return None;
    }
    Some((u32_literal(&parts[0])?, u32_literal(&parts[1])?))
}

/// Normalize a `gpus=[GpuGroup.ADA_24, ...]` (or single attribute) value
/// into the comma-separated pool string. Unknown attributes pass through as
/// their bare token so the control plane can reject them with context.
fn gpu_tokens(raw: &str) -> String {
    let raw = raw.trim();
    let inner = raw
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(raw);
    let tokens: Vec<String> = split_top_level(inner, ',')
        .iter()
        .map(|item| {
            let item = item.trim();
            let attr = item.rsplit('.').next().unwrap_or(item);
            match GpuGroup::parse(attr) {
                Some(group) => group.as_str().to_string(),
                None => attr.to_string(),
            }
        })
        .filter(|t| !t.is_empty())
        .collect();
    tokens.join(",")
}
