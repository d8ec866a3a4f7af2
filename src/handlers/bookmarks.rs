use axum::{
    extract::{Extension, Path, Query, State},
    http::Method,
    response::Response,
    Json,
};
use serde_json::Value;
use tracing::Instrument;

use super::AppState;
use crate::controller::{ListQuery, ResourceRequest, ResourceResponse, Verb};
use crate::error::ApiError;
use crate::gateway::RequestContext;
use crate::middleware::respond;
use crate::types::{Identity, RecordId};

fn build_request(method: &Method, id: Option<RecordId>, query: ListQuery, body: Option<Json<Value>>) -> Result<ResourceRequest, ApiError> {
    let mut request = ResourceRequest::new(Verb::try_from(method)?).with_filters(query.into_filter_data()?);
    if let Some(id) = id {
        request = request.with_id(id);
    }
    if let Some(Json(payload)) = body {
        request = request.with_payload(payload);
    }
    Ok(request)
}

async fn run_all(state: &AppState, ctx: &mut RequestContext, query: ListQuery) -> Result<ResourceResponse, ApiError> {
    let controller = state.bookmarks_controller().await?;
    controller.all(ctx, query.into_filter_data()?).await
}

async fn run_one(state: &AppState, ctx: &mut RequestContext, request: Result<ResourceRequest, ApiError>) -> Result<ResourceResponse, ApiError> {
    let controller = state.bookmarks_controller().await?;
    controller.one(ctx, request?).await
}

async fn run_user(
    state: &AppState,
    ctx: &mut RequestContext,
    user: Option<RecordId>,
    request: Result<ResourceRequest, ApiError>,
) -> Result<ResourceResponse, ApiError> {
    let controller = state.bookmarks_controller().await?;
    match user {
        Some(user) => controller.process_user_bookmarks(ctx, user, request?).await,
        None => controller.mine(ctx, request?).await,
    }
}

async fn run_preferences(state: &AppState, ctx: &mut RequestContext, title: &str, query: ListQuery) -> Result<ResourceResponse, ApiError> {
    let controller = state.bookmarks_controller().await?;
    controller.preferences(ctx, title, query.into_filter_data()?).await
}

/// GET /bookmarks
pub async fn all(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<ListQuery>,
) -> Response {
    let mut ctx = state.context(identity);
    let span = ctx.span().clone();
    let result = run_all(&state, &mut ctx, query).instrument(span.clone()).await;
    span.in_scope(|| respond(&mut ctx, state.tag_header(), result))
}

/// POST /bookmarks
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    method: Method,
    Query(query): Query<ListQuery>,
    body: Option<Json<Value>>,
) -> Response {
    let mut ctx = state.context(identity);
    let span = ctx.span().clone();
    let request = build_request(&method, None, query, body);
    let result = run_one(&state, &mut ctx, request).instrument(span.clone()).await;
    span.in_scope(|| respond(&mut ctx, state.tag_header(), result))
}

/// GET|POST|PUT|PATCH|DELETE /bookmarks/:id
pub async fn one(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    method: Method,
    Path(id): Path<RecordId>,
    Query(query): Query<ListQuery>,
    body: Option<Json<Value>>,
) -> Response {
    let mut ctx = state.context(identity);
    let span = ctx.span().clone();
    let request = build_request(&method, Some(id), query, body);
    let result = run_one(&state, &mut ctx, request).instrument(span.clone()).await;
    span.in_scope(|| respond(&mut ctx, state.tag_header(), result))
}

/// GET|POST|PUT /bookmarks/user/me
pub async fn mine(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    method: Method,
    Query(query): Query<ListQuery>,
    body: Option<Json<Value>>,
) -> Response {
    let mut ctx = state.context(identity);
    let span = ctx.span().clone();
    let request = build_request(&method, None, query, body);
    let result = run_user(&state, &mut ctx, None, request).instrument(span.clone()).await;
    span.in_scope(|| respond(&mut ctx, state.tag_header(), result))
}

/// GET|POST|PUT /bookmarks/user/:id
pub async fn user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    method: Method,
    Path(user): Path<RecordId>,
    Query(query): Query<ListQuery>,
    body: Option<Json<Value>>,
) -> Response {
    let mut ctx = state.context(identity);
    let span = ctx.span().clone();
    let request = build_request(&method, None, query, body);
    let result = run_user(&state, &mut ctx, Some(user), request).instrument(span.clone()).await;
    span.in_scope(|| respond(&mut ctx, state.tag_header(), result))
}

/// GET /bookmarks/preferences/:title
pub async fn preferences(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(title): Path<String>,
    Query(query): Query<ListQuery>,
) -> Response {
    let mut ctx = state.context(identity);
    let span = ctx.span().clone();
    let result = run_preferences(&state, &mut ctx, &title, query).instrument(span.clone()).await;
    span.in_scope(|| respond(&mut ctx, state.tag_header(), result))
}
