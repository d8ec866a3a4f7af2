use axum::{
    extract::{Extension, Path, Query, State},
    http::Method,
    response::Response,
    Json,
};
use serde_json::Value;
use tracing::Instrument;

use super::AppState;
use crate::controller::{ItemsController, ListQuery, ResourceRequest, ResourceResponse, Verb};
use crate::error::ApiError;
use crate::gateway::RequestContext;
use crate::middleware::respond;
use crate::types::{Identity, RecordId};

async fn run(
    state: &AppState,
    ctx: &mut RequestContext,
    table: &str,
    method: &Method,
    id: Option<RecordId>,
    query: ListQuery,
    body: Option<Json<Value>>,
) -> Result<ResourceResponse, ApiError> {
    let mut request = ResourceRequest::new(Verb::try_from(method)?).with_filters(query.into_filter_data()?);
    if let Some(id) = id {
        request = request.with_id(id);
    }
    if let Some(Json(payload)) = body {
        request = request.with_payload(payload);
    }

    let controller = ItemsController::new(state.gateway(table).await?);
    controller.handle(ctx, request).await
}

/// GET|POST /items/:table
pub async fn collection(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    method: Method,
    Path(table): Path<String>,
    Query(query): Query<ListQuery>,
    body: Option<Json<Value>>,
) -> Response {
    let mut ctx = state.context(identity);
    let span = ctx.span().clone();
    let result = run(&state, &mut ctx, &table, &method, None, query, body).instrument(span.clone()).await;
    span.in_scope(|| respond(&mut ctx, state.tag_header(), result))
}

/// GET|PUT|PATCH|DELETE /items/:table/:id
pub async fn record(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    method: Method,
    Path((table, id)): Path<(String, RecordId)>,
    Query(query): Query<ListQuery>,
    body: Option<Json<Value>>,
) -> Response {
    let mut ctx = state.context(identity);
    let span = ctx.span().clone();
    let result = run(&state, &mut ctx, &table, &method, Some(id), query, body).instrument(span.clone()).await;
    span.in_scope(|| respond(&mut ctx, state.tag_header(), result))
}
