//! `flash preview` — a local gateway over the deployed endpoints.
//!
//! Every LB route in the manifest is mounted under
//! `/<resource><path>` and proxied to the resource's deployed URL, with
//! the caller's bearer token passed through. Queue resources are listed
//! but not mounted — they are invoked with `flash run`.

use std::path::Path;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::any;
use axum::{Json, Router};
use serde_json::json;

use flash_domain::manifest::Manifest;
use flash_runtime::manifest_loader::load_manifest;

#[derive(Clone)]
struct ProxyTarget {
    url: String,
    method: String,
}

pub async fn run(port: u16, manifest_path: Option<&str>) -> anyhow::Result<()> {
    let manifest = load_manifest(manifest_path.map(Path::new))?;
    let router = build_router(&manifest)?;

    let address = format!("127.0.0.1:{port}");
    println!("Preview gateway on http://{address}");
    print_routes(&manifest);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

fn build_router(manifest: &Manifest) -> anyhow::Result<Router> {
    let endpoints = manifest.resources_endpoints.clone().unwrap_or_default();
    let client = Arc::new(reqwest::Client::new());
    let mut router = Router::new();

    for (resource_name, resource) in &manifest.resources {
        if !resource.is_load_balanced {
            continue;
        }
        let Some(base_url) = endpoints.get(resource_name) else {
            tracing::warn!(resource = %resource_name, "no deployed URL; run 'flash deploy' first");
            continue;
        };
        for function in &resource.functions {
            let (Some(method), Some(path)) = (&function.http_method, &function.http_path)
            else {
                continue;
            };
            let target = ProxyTarget {
                url: format!("{}{}", base_url.trim_end_matches('/'), path),
                method: method.clone(),
            };
            let mount = format!("/{resource_name}{path}");
            let client = Arc::clone(&client);
            router = router.route(
                &mount,
                any(move |headers: HeaderMap, body: Bytes| proxy(client, target, headers, body)),
            );
        }
    }
    Ok(router)
}

async fn proxy(
    client: Arc<reqwest::Client>,
    target: ProxyTarget,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let method = reqwest::Method::from_bytes(target.method.as_bytes())
        .unwrap_or(reqwest::Method::POST);
    let mut request = client
        .request(method, &target.url)
        .header("Content-Type", "application/json");
    if let Some(authorization) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(value) = authorization.to_str() {
            request = request.header("Authorization", value);
        }
    }
    if !body.is_empty() {
        request = request.body(body.to_vec());
    }

    match request.send().await {
        Ok(response) => {
            let status =
                StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            let payload: serde_json::Value = response
                .json()
                .await
                .unwrap_or_else(|e| json!({ "error": format!("non-JSON upstream response: {e}") }));
            (status, Json(payload))
        }
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": format!("upstream unreachable: {e}") })),
        ),
    }
}

fn print_routes(manifest: &Manifest) {
    for (resource_name, resource) in &manifest.resources {
        if resource.is_load_balanced {
            for function in &resource.functions {
                if let (Some(method), Some(path)) = (&function.http_method, &function.http_path)
                {
                    println!("  {method:6} /{resource_name}{path}");
                }
            }
        } else {
            println!("  queue  {resource_name} (invoke with 'flash run')");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flash_domain::manifest::{ManifestFunction, ManifestResource};

    #[test]
    fn router_builds_with_and_without_endpoints() {
        let mut manifest = Manifest::default();
        manifest.resources.insert(
            "api".into(),
            ManifestResource {
                resource_type: "LiveLoadBalancer".into(),
                is_load_balanced: true,
                functions: vec![ManifestFunction {
                    name: "health".into(),
                    module: "api".into(),
                    is_async: true,
                    is_class: false,
                    http_method: Some("GET".into()),
                    http_path: Some("/health".into()),
                }],
                ..Default::default()
            },
        );

        // Without a deployed URL the route is skipped but the router builds.
        assert!(build_router(&manifest).is_ok());

        let mut endpoints = std::collections::BTreeMap::new();
        endpoints.insert("api".to_string(), "https://api-ep.example.com".to_string());
        manifest.resources_endpoints = Some(endpoints);
        assert!(build_router(&manifest).is_ok());
    }
}
