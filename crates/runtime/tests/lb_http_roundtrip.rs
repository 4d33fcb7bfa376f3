//! HTTP round-trips through the load-balancer app: auto-schema binding,
//! validation failures, credential scoping, and the eval endpoint.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use flash_client::context;
use flash_codec::PayloadValue;
use flash_runtime::lb_handler::{LoadBalancerApp, ParamKind, ParamSpec};
use flash_runtime::FunctionRegistry;

fn registry() -> Arc<FunctionRegistry> {
    let registry = FunctionRegistry::new();

    registry.register_async("create_item", |_args, kwargs| {
        Box::pin(async move {
            let mut price = 0.0;
            let mut quantity = 1i64;
            for (key, value) in &kwargs {
                match (key.as_str(), value) {
                    ("price", PayloadValue::Float(f)) => price = *f,
                    ("price", PayloadValue::Int(i)) => price = *i as f64,
                    ("quantity", PayloadValue::Int(i)) => quantity = *i,
                    _ => {}
                }
            }
            Ok(PayloadValue::Map(vec![(
                "total".into(),
                PayloadValue::Float(price * quantity as f64),
            )]))
        })
    });

    registry.register_async("whoami", |_args, _kwargs| {
        Box::pin(async move {
            Ok(match context::get() {
                Some(key) => PayloadValue::Str(key),
                None => PayloadValue::Null,
            })
        })
    });

    registry.register_fn("health", |_, _| {
        Ok(PayloadValue::Map(vec![(
            "status".into(),
            PayloadValue::str("healthy"),
        )]))
    });

    Arc::new(registry)
}

fn app() -> axum::Router {
    let mut app = LoadBalancerApp::new(registry(), true);
    app.add_route(
        "POST",
        "/items",
        "create_item",
        vec![
            ParamSpec::required("name", ParamKind::Str),
            ParamSpec::required("price", ParamKind::Float),
            ParamSpec::optional("quantity", ParamKind::Int, json!(1)),
        ],
    );
    app.add_route("GET", "/whoami", "whoami", Vec::new());
    app.add_route("GET", "/health", "health", Vec::new());
    app.router()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post(path: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn auto_schema_binds_and_computes() {
    let response = app()
        .oneshot(post(
            "/items",
            json!({"name": "Widget", "price": 9.99, "quantity": 3}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!((body["total"].as_f64().unwrap() - 29.97).abs() < 1e-9);
}

#[tokio::test]
async fn optional_param_defaults() {
    let response = app()
        .oneshot(post("/items", json!({"name": "Widget", "price": 2.5})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!((body["total"].as_f64().unwrap() - 2.5).abs() < 1e-9);
}

#[tokio::test]
async fn missing_required_field_is_422() {
    let response = app()
        .oneshot(post("/items", json!({"price": 9.99})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn zero_param_route_takes_no_body() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"status": "healthy"}));
}

#[tokio::test]
async fn bearer_token_is_scoped_to_the_request() {
    // During the request the handler sees the caller's key.
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/whoami")
                .header(header::AUTHORIZATION, "Bearer caller-key-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!("caller-key-123"));

    // After it completes nothing remains in the enclosing task.
    assert_eq!(context::get(), None);

    // A request without credentials sees an empty context.
    let response = app()
        .oneshot(Request::builder().uri("/whoami").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!(null));
}

#[tokio::test]
async fn eval_endpoint_executes_registered_function() {
    let response = app()
        .oneshot(post(
            "/execute",
            json!({
                "function_name": "health",
                "function_code": "def health():\n    return {\"status\": \"healthy\"}\n",
                "args": [],
                "kwargs": {}
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["json_result"]["status"], json!("healthy"));
}

#[tokio::test]
async fn eval_reports_syntax_and_missing_function_distinctly() {
    // Unbalanced code → syntax error.
    let response = app()
        .oneshot(post(
            "/execute",
            json!({
                "function_name": "f",
                "function_code": "def f(:\n    pass\n"
            }),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].as_str().unwrap().starts_with("Syntax error"));

    // Valid code that defines something else → missing function.
    let response = app()
        .oneshot(post(
            "/execute",
            json!({
                "function_name": "f",
                "function_code": "def g(x):\n    return x\n"
            }),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].as_str().unwrap().contains("not found in provided code"));
}
