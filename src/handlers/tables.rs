use axum::{
    extract::{Extension, Path, State},
    response::Response,
    Json,
};
use serde_json::Value;
use tracing::Instrument;

use super::AppState;
use crate::controller::ResourceResponse;
use crate::error::ApiError;
use crate::gateway::RequestContext;
use crate::middleware::respond;
use crate::services::{ColumnSpec, TableSpec};
use crate::types::Identity;

fn parse<T: serde::de::DeserializeOwned>(payload: Value) -> Result<T, ApiError> {
    serde_json::from_value(payload).map_err(|e| ApiError::invalid_json(e.to_string()))
}

fn schema_json<T: serde::Serialize>(schema: &T) -> Result<Value, ApiError> {
    serde_json::to_value(schema).map_err(|e| ApiError::internal_server_error(e.to_string()))
}

async fn run_create(state: &AppState, ctx: &mut RequestContext, payload: Value) -> Result<ResourceResponse, ApiError> {
    let spec: TableSpec = parse(payload)?;
    let schema = state.schema_service().create_table(ctx, spec).await?;
    Ok(ResourceResponse::Created(schema_json(&schema)?))
}

async fn run_add_column(state: &AppState, ctx: &mut RequestContext, table: &str, payload: Value) -> Result<ResourceResponse, ApiError> {
    let spec: ColumnSpec = parse(payload)?;
    let schema = state.schema_service().add_column(ctx, table, spec).await?;
    Ok(ResourceResponse::Created(schema_json(&schema)?))
}

/// POST /tables
pub async fn create_table(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<Value>,
) -> Response {
    let mut ctx = state.context(identity);
    let span = ctx.span().clone();
    let result = run_create(&state, &mut ctx, payload).instrument(span.clone()).await;
    span.in_scope(|| respond(&mut ctx, state.tag_header(), result))
}

/// POST /tables/:table/columns
pub async fn add_column(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(table): Path<String>,
    Json(payload): Json<Value>,
) -> Response {
    let mut ctx = state.context(identity);
    let span = ctx.span().clone();
    let result = run_add_column(&state, &mut ctx, &table, payload).instrument(span.clone()).await;
    span.in_scope(|| respond(&mut ctx, state.tag_header(), result))
}
