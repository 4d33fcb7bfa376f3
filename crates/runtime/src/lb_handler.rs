//! Load-balanced HTTP endpoint runtime.
//!
//! Routes declared in user code become an axum application. Each route's
//! body schema is synthesized from the handler's declared parameters:
//! required fields must be present and well-typed (422 otherwise), optional
//! fields fall back to their defaults, and a handler with a single untyped
//! parameter receives the whole body. The credential middleware owns the
//! set/clear symmetry for `Authorization: Bearer` — the key is visible to
//! the handler's task for exactly the lifetime of the request.

use std::sync::Arc;

use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use flash_build::scanner::ParamInfo;
use flash_client::context;
use flash_codec::PayloadValue;
use flash_domain::protocol::JobResponse;
use flash_domain::{Error, Result};

use crate::json_bridge;
use crate::registry::{Args, FunctionRegistry, Kwargs, UserCallable};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Route schemas
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Str,
    Int,
    Float,
    Bool,
    /// Untyped or structured: accepts any JSON value.
    Any,
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParamKind, default: Value) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: Some(default),
        }
    }

    /// Synthesize the schema entry for one declared parameter.
    pub fn from_param(param: &ParamInfo) -> Self {
        let kind = match param.type_hint.as_deref() {
            Some("str") => ParamKind::Str,
            Some("int") => ParamKind::Int,
            Some("float") => ParamKind::Float,
            Some("bool") => ParamKind::Bool,
            _ => ParamKind::Any,
        };
        match &param.default {
            Some(raw) => {
                let default =
                    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()));
                ParamSpec::optional(param.name.clone(), kind, default)
            }
            None => ParamSpec::required(param.name.clone(), kind),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self.kind {
            ParamKind::Str => value.is_string(),
            ParamKind::Int => value.is_i64() || value.is_u64(),
            ParamKind::Float => value.is_number(),
            ParamKind::Bool => value.is_boolean(),
            ParamKind::Any => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteSpec {
    pub method: String,
    pub path: String,
    pub function: String,
    pub params: Vec<ParamSpec>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// App builder
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct LoadBalancerApp {
    registry: Arc<FunctionRegistry>,
    routes: Vec<RouteSpec>,
    include_eval: bool,
}

impl LoadBalancerApp {
    pub fn new(registry: Arc<FunctionRegistry>, include_eval: bool) -> Self {
        Self {
            registry,
            routes: Vec::new(),
            include_eval,
        }
    }

    pub fn add_route(
        &mut self,
        method: &str,
        path: &str,
        function: &str,
        params: Vec<ParamSpec>,
    ) -> &mut Self {
        self.routes.push(RouteSpec {
            method: method.to_uppercase(),
            path: path.to_string(),
            function: function.to_string(),
            params,
        });
        self
    }

    /// Build the axum router: user routes, optional eval endpoint, and the
    /// credential middleware over everything.
    pub fn router(&self) -> Router {
        let mut router = Router::new();

        for route in &self.routes {
            let registry = Arc::clone(&self.registry);
            let spec = route.clone();
            let has_body = matches!(spec.method.as_str(), "POST" | "PUT" | "PATCH");

            let handler = move |body: Option<Json<Value>>| {
                let registry = Arc::clone(&registry);
                let spec = spec.clone();
                async move {
                    let body = if has_body {
                        body.map(|Json(v)| v)
                    } else {
                        None
                    };
                    handle_route(&registry, &spec, body).await
                }
            };

            let method_router = match route.method.as_str() {
                "GET" => get(handler),
                "POST" => post(handler),
                "PUT" => put(handler),
                "PATCH" => patch(handler),
                "DELETE" => delete(handler),
                other => {
                    tracing::warn!(method = other, path = %route.path, "unsupported route method");
                    continue;
                }
            };
            router = router.route(&route.path, method_router);
        }

        if self.include_eval {
            let registry = Arc::clone(&self.registry);
            router = router.route(
                "/execute",
                post(move |Json(request): Json<EvalRequest>| {
                    let registry = Arc::clone(&registry);
                    async move { Json(handle_eval(&registry, request).await) }
                }),
            );
        }

        router
            .layer(axum::middleware::from_fn(credential_middleware))
            .layer(tower_http::trace::TraceLayer::new_for_http())
    }
}

// ── Credential middleware ──────────────────────────────────────────

/// Scope the caller's bearer token to this request's task. The scope ends
/// with the request future on every exit path, so nothing ever leaks into
/// the next request on this connection.
async fn credential_middleware(
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let key = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty());

    context::scope(key, next.run(request)).await
}

// ── Route dispatch ─────────────────────────────────────────────────

struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // No stack traces leave the process; clients get the message only.
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

async fn handle_route(
    registry: &FunctionRegistry,
    spec: &RouteSpec,
    body: Option<Value>,
) -> std::result::Result<Json<Value>, ApiError> {
    let kwargs = bind_body(spec, body).map_err(|message| ApiError {
        status: StatusCode::UNPROCESSABLE_ENTITY,
        message,
    })?;

    match invoke(registry, &spec.function, Vec::new(), kwargs).await {
        Ok(value) => {
            let rendered = json_bridge::to_json(&value).map_err(|e| ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: e.to_string(),
            })?;
            Ok(Json(rendered))
        }
        Err(e) => {
            tracing::error!(function = %spec.function, error = %e, "route handler failed");
            Err(ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: e.to_string(),
            })
        }
    }
}

/// Parse the request body against the route's synthesized schema and bind
/// it to keyword arguments.
fn bind_body(spec: &RouteSpec, body: Option<Value>) -> std::result::Result<Kwargs, String> {
    // No declared parameters: the route takes no body.
    if spec.params.is_empty() {
        return Ok(Vec::new());
    }

    // Single untyped parameter: the whole body binds to it.
    if spec.params.len() == 1 && spec.params[0].kind == ParamKind::Any {
        let value = body.unwrap_or(Value::Null);
        return Ok(vec![(
            spec.params[0].name.clone(),
            json_bridge::from_json(&value),
        )]);
    }

    let map = match body {
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(format!(
                "request body must be a JSON object, got: {}",
                type_name(&other)
            ))
        }
        None => Map::new(),
    };

    let mut kwargs = Vec::with_capacity(spec.params.len());
    for param in &spec.params {
        match map.get(&param.name) {
            Some(value) => {
                if !param.accepts(value) {
                    return Err(format!(
                        "field '{}' expected {}, got: {}",
                        param.name,
                        kind_name(param.kind),
                        type_name(value)
                    ));
                }
                kwargs.push((param.name.clone(), json_bridge::from_json(value)));
            }
            None if param.required => {
                return Err(format!("missing required field '{}'", param.name))
            }
            None => {
                let default = param.default.clone().unwrap_or(Value::Null);
                kwargs.push((param.name.clone(), json_bridge::from_json(&default)));
            }
        }
    }
    Ok(kwargs)
}

fn kind_name(kind: ParamKind) -> &'static str {
    match kind {
        ParamKind::Str => "a string",
        ParamKind::Int => "an integer",
        ParamKind::Float => "a number",
        ParamKind::Bool => "a boolean",
        ParamKind::Any => "any value",
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

async fn invoke(
    registry: &FunctionRegistry,
    function: &str,
    args: Args,
    kwargs: Kwargs,
) -> Result<PayloadValue> {
    match registry.lookup(function) {
        Some(UserCallable::Sync(f)) => f(args, kwargs),
        Some(UserCallable::Async(f)) => f(args, kwargs).await,
        Some(UserCallable::Class(_)) => Err(Error::Config(format!(
            "'{function}' is a class and cannot serve a route directly"
        ))),
        None => Err(Error::NotFound(format!("function '{function}'"))),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Eval endpoint
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct EvalRequest {
    function_name: String,
    #[serde(default)]
    function_code: String,
    #[serde(default)]
    args: Vec<Value>,
    #[serde(default)]
    kwargs: Map<String, Value>,
}

/// Execute a function shipped in the request body. The code is checked
/// syntactically and its definitions form an isolated namespace; the named
/// function is then dispatched through the process registry. Syntax errors
/// and missing functions are distinct failures.
async fn handle_eval(registry: &FunctionRegistry, request: EvalRequest) -> JobResponse {
    let namespace = match check_code(&request.function_code) {
        Ok(names) => names,
        Err(detail) => return JobResponse::failure(format!("Syntax error: {detail}")),
    };

    if !namespace.contains(&request.function_name) {
        return JobResponse::failure(format!(
            "Function '{}' not found in provided code; defines: {}",
            request.function_name,
            namespace.join(", ")
        ));
    }

    let args: Args = request.args.iter().map(json_bridge::from_json).collect();
    let kwargs: Kwargs = request
        .kwargs
        .iter()
        .map(|(k, v)| (k.clone(), json_bridge::from_json(v)))
        .collect();

    match invoke(registry, &request.function_name, args, kwargs).await {
        Ok(value) => match json_bridge::to_json(&value) {
            Ok(rendered) => JobResponse::ok_json(rendered),
            Err(e) => JobResponse::failure(e.to_string()),
        },
        Err(e) => JobResponse::failure(e.to_string()).with_traceback(format!("{e:?}")),
    }
}

/// Light syntax pass over submitted code: delimiters must balance and at
/// least one function must be defined. Returns the defined names.
fn check_code(code: &str) -> std::result::Result<Vec<String>, String> {
    if code.trim().is_empty() {
        return Err("empty function_code".into());
    }

    let mut depth = 0i64;
    let mut quote: Option<char> = None;
    for (i, c) in code.chars().enumerate() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth < 0 {
                    return Err(format!("unbalanced delimiter at offset {i}"));
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("unclosed delimiter".into());
    }

    let def = regex::Regex::new(r"(?m)^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(")
        .expect("static regex");
    let names: Vec<String> = def
        .captures_iter(code)
        .map(|c| c[1].to_string())
        .collect();
    if names.is_empty() {
        return Err("no function definition found".into());
    }
    Ok(names)
}
