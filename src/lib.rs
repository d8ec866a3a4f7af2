pub mod acl;
pub mod auth;
pub mod cache;
pub mod config;
pub mod controller;
pub mod database;
pub mod ddl;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod types;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

pub use handlers::AppState;

/// Full application router over `state`
pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(bookmark_routes())
        .merge(item_routes())
        .merge(table_routes())
        .route_layer(from_fn_with_state(state.clone(), middleware::jwt_auth_middleware));

    let mut router = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(protected)
        .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes));

    if let Some(cors) = cors_layer(&state.config.security) {
        router = router.layer(cors);
    }
    if state.config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    router.with_state(state)
}

fn bookmark_routes() -> Router<AppState> {
    use handlers::bookmarks;

    Router::new()
        .route("/bookmarks", get(bookmarks::all).post(bookmarks::create))
        .route(
            "/bookmarks/:id",
            get(bookmarks::one)
                .post(bookmarks::one)
                .put(bookmarks::one)
                .patch(bookmarks::one)
                .delete(bookmarks::one),
        )
        .route(
            "/bookmarks/user/me",
            get(bookmarks::mine).post(bookmarks::mine).put(bookmarks::mine),
        )
        .route(
            "/bookmarks/user/:id",
            get(bookmarks::user).post(bookmarks::user).put(bookmarks::user),
        )
        .route("/bookmarks/preferences/:title", get(bookmarks::preferences))
}

fn item_routes() -> Router<AppState> {
    use handlers::items;

    Router::new()
        .route("/items/:table", get(items::collection).post(items::collection))
        .route(
            "/items/:table/:id",
            get(items::record)
                .put(items::record)
                .patch(items::record)
                .delete(items::record),
        )
}

fn table_routes() -> Router<AppState> {
    use handlers::tables;

    Router::new()
        .route("/tables", post(tables::create_table))
        .route("/tables/:table/columns", post(tables::add_column))
}

fn cors_layer(security: &config::SecurityConfig) -> Option<CorsLayer> {
    if !security.enable_cors {
        return None;
    }
    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        return Some(CorsLayer::permissive());
    }
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    Some(CorsLayer::new().allow_origin(AllowOrigin::list(origins)))
}

async fn root() -> Json<Value> {
    Json(json!({
        "data": {
            "name": "tablegate",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "bookmarks": "/bookmarks[/:id], /bookmarks/user/me, /bookmarks/user/:id, /bookmarks/preferences/:title",
                "items": "/items/:table[/:id]",
                "tables": "/tables, /tables/:table/columns",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "data": { "status": "ok", "timestamp": now, "database": "ok" } })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": { "message": "database unavailable", "code": "SERVICE_UNAVAILABLE" },
                    "data": { "status": "degraded", "timestamp": now }
                })),
            )
        }
    }
}
