use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use tablegate::acl::AclPolicy;
use tablegate::auth::{generate_jwt, Claims};
use tablegate::config::AppConfig;
use tablegate::database::{MemoryStore, RowStore, SchemaCatalog};
use tablegate::types::Identity;
use tablegate::AppState;

pub const TEST_SECRET: &str = "integration-test-secret";

/// Memory-backed state with the system tables created
pub async fn test_state() -> Result<AppState> {
    let mut config = AppConfig::development();
    config.security.jwt_secret = TEST_SECRET.to_string();
    config.api.enable_request_logging = false;

    let store = Arc::new(MemoryStore::new());
    let catalog = Arc::new(SchemaCatalog::with_system_tables()?);
    for schema in catalog.schemas().await {
        store.apply_schema(&schema.create_change()).await?;
    }

    let acl = Arc::new(AclPolicy::from_config(&config.acl));
    Ok(AppState::new(config, store, acl, catalog))
}

pub async fn test_app() -> Result<Router> {
    Ok(tablegate::app(test_state().await?))
}

pub fn token_for(identity: &Identity) -> Result<String> {
    let claims = Claims::new(identity, chrono::Duration::hours(1));
    generate_jwt(&claims, TEST_SECRET).context("failed to mint test token")
}

pub struct TestResponse {
    pub status: StatusCode,
    pub cache_tags: Option<String>,
    pub body: Value,
}

/// Send one request through the router; `identity` of `None` sends no token
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    identity: Option<&Identity>,
    body: Option<Value>,
) -> Result<TestResponse> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(identity) = identity {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token_for(identity)?));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let cache_tags = response
        .headers()
        .get("x-cache-tags")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };

    Ok(TestResponse { status, cache_tags, body })
}
