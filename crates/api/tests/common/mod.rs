#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use recordguard_api::config::ServerConfig;
use recordguard_api::router::build_app_router;
use recordguard_api::state::AppState;
use recordguard_core::memory::MemoryStore;
use serde_json::Value;
use tower::ServiceExt;

pub const TENANT: &str = "1";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        duplicate_check_timeout_ms: 2000,
    }
}

/// Build the full application router over an in-memory store.
///
/// Uses the same middleware stack as production so tests exercise request
/// IDs, timeouts, and panic recovery too.
pub fn build_test_app(store: Arc<MemoryStore>) -> Router {
    build_app_router(AppState::from_store(store, test_config(), None))
}

/// Send a request with the tenant header set, optionally with a JSON body.
pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    tenant: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(tenant) = tenant {
        builder = builder.header("x-tenant-id", tenant);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(TENANT), None).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(TENANT), Some(body)).await
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Let spawned fire-and-forget tasks run to completion.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
