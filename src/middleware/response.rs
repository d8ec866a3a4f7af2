use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::cache::header_value;
use crate::controller::ResourceResponse;
use crate::error::ApiError;
use crate::gateway::RequestContext;

/// Wrapper for API responses that adds the `data` envelope
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T) -> Self {
        Self { data, status_code: None }
    }

    /// Create an API response with custom status code
    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self { data, status_code: Some(status_code) }
    }

    /// Create a 201 Created response
    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        let data_value = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                return ApiError::internal_server_error("Failed to serialize response data").into_response();
            }
        };

        (status, Json(json!({ "data": data_value }))).into_response()
    }
}

/// Turn a controller outcome into the HTTP response, attaching the request's cache tags.
///
/// Tags are drained here, once, whether the request succeeded or not; a
/// failing request may still have touched rows before the failure.
pub fn respond(ctx: &mut RequestContext, tag_header: &str, result: Result<ResourceResponse, ApiError>) -> Response {
    let mut response = match result {
        Ok(ResourceResponse::Data(data)) => ApiResponse::success(data).into_response(),
        Ok(ResourceResponse::Created(data)) => ApiResponse::created(data).into_response(),
        Ok(ResourceResponse::Empty) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            if err.status_code() >= 500 {
                tracing::error!(request_id = %ctx.request_id, "Request failed: {}", err);
            } else {
                tracing::debug!(request_id = %ctx.request_id, code = err.error_code(), "Request rejected: {}", err);
            }
            err.into_response()
        }
    };

    let tags = ctx.take_tags();
    tracing::debug!(
        request_id = %ctx.request_id,
        status = response.status().as_u16(),
        tags = tags.len(),
        elapsed_ms = ctx.elapsed().as_millis() as u64,
        "Request complete"
    );
    if tags.is_empty() {
        return response;
    }

    match (
        HeaderName::from_bytes(tag_header.as_bytes()),
        HeaderValue::from_str(&header_value(&tags)),
    ) {
        (Ok(name), Ok(value)) => {
            response.headers_mut().insert(name, value);
        }
        _ => tracing::warn!("Cache tags not representable as header '{}'", tag_header),
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Identity;

    #[test]
    fn tags_travel_on_the_configured_header() {
        let mut ctx = RequestContext::new(Identity::user(1));
        ctx.tags.record_row("directus_bookmarks", 3);
        let response = respond(&mut ctx, "x-cache-tags", Ok(ResourceResponse::Empty));

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers().get("x-cache-tags").unwrap(),
            "entity_directus_bookmarks_3,table_directus_bookmarks"
        );
        assert!(ctx.tags.is_empty());
    }

    #[test]
    fn errors_keep_their_status() {
        let mut ctx = RequestContext::new(Identity::user(1));
        let response = respond(&mut ctx, "x-cache-tags", Err(ApiError::not_found("bookmark_not_found")));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get("x-cache-tags").is_none());
    }
}
