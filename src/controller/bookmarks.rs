use serde_json::Value;

use super::request::{ResourceRequest, ResourceResponse, Verb};
use crate::database::EntityRecord;
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::gateway::{BookmarkGateway, DeleteOutcome, GatewayError, PreferenceGateway, RequestContext};
use crate::types::RecordId;

/// Message returned when a bookmark or its preferences cannot be found
pub const BOOKMARK_NOT_FOUND: &str = "bookmark_not_found";

/// Verb-to-operation orchestration for the bookmarks resource
pub struct BookmarksController {
    bookmarks: BookmarkGateway,
    preferences: PreferenceGateway,
}

fn json_array(records: Vec<EntityRecord>) -> Value {
    Value::Array(records.into_iter().map(Value::from).collect())
}

fn bookmark_not_found(err: GatewayError) -> ApiError {
    if err.is_not_found() {
        ApiError::not_found(BOOKMARK_NOT_FOUND)
    } else {
        err.into()
    }
}

impl BookmarksController {
    pub fn new(bookmarks: BookmarkGateway, preferences: PreferenceGateway) -> Self {
        Self { bookmarks, preferences }
    }

    /// Every bookmark visible to the caller
    pub async fn all(&self, ctx: &mut RequestContext, filters: FilterData) -> Result<ResourceResponse, ApiError> {
        let records = self.bookmarks.fetch_all(ctx, filters).await?;
        Ok(ResourceResponse::Data(json_array(records)))
    }

    pub async fn one(&self, ctx: &mut RequestContext, request: ResourceRequest) -> Result<ResourceResponse, ApiError> {
        let user = ctx.identity.id;
        match request.verb {
            Verb::Post => {
                let id = self.bookmarks.insert_bookmark(ctx, request.record()?).await?;
                let record = self
                    .bookmarks
                    .fetch_entity_by_user_and_id(ctx, user, id)
                    .await
                    .map_err(bookmark_not_found)?;
                Ok(ResourceResponse::Created(record.into()))
            }
            Verb::Put | Verb::Patch => {
                let id = self
                    .bookmarks
                    .update_bookmark(ctx, request.update_record()?)
                    .await
                    .map_err(bookmark_not_found)?;
                let record = self.bookmarks.fetch_by_id(ctx, id).await.map_err(bookmark_not_found)?;
                Ok(ResourceResponse::Data(record.into()))
            }
            Verb::Delete => {
                let id = request.id.ok_or_else(|| ApiError::bad_request("Bookmark id is required"))?;
                self.delete(ctx, id).await
            }
            Verb::Get => match request.id {
                Some(id) => {
                    let record = self.bookmarks.fetch_by_id(ctx, id).await.map_err(bookmark_not_found)?;
                    Ok(ResourceResponse::Data(record.into()))
                }
                None => {
                    let records = self.bookmarks.fetch_entities_by_user_id(ctx, user, request.filters).await?;
                    Ok(ResourceResponse::Data(json_array(records)))
                }
            },
        }
    }

    /// Pre-fetch, delete, then remove the preference row sharing the bookmark's owner and title
    async fn delete(&self, ctx: &mut RequestContext, id: RecordId) -> Result<ResourceResponse, ApiError> {
        let bookmark = self.bookmarks.fetch_by_id(ctx, id).await.map_err(bookmark_not_found)?;

        if self.bookmarks.delete(ctx, id).await? == DeleteOutcome::NotFound {
            return Err(ApiError::not_found(BOOKMARK_NOT_FOUND));
        }

        let owner = bookmark
            .get(self.bookmarks.owner_column())
            .and_then(Value::as_i64)
            .unwrap_or(ctx.identity.id);
        if let Some(title) = bookmark.get("title").and_then(Value::as_str) {
            let removed = self.preferences.delete_by_user_and_title(ctx, owner, title).await?;
            tracing::debug!(request_id = %ctx.request_id, bookmark = id, removed, "Removed bookmark preferences");
        }
        Ok(ResourceResponse::Empty)
    }

    /// Bookmarks of one user, after applying any write the verb carries
    pub async fn process_user_bookmarks(
        &self,
        ctx: &mut RequestContext,
        user: RecordId,
        request: ResourceRequest,
    ) -> Result<ResourceResponse, ApiError> {
        match request.verb {
            Verb::Put | Verb::Patch => {
                self.bookmarks
                    .update_bookmark(ctx, request.update_record()?)
                    .await
                    .map_err(bookmark_not_found)?;
            }
            Verb::Post => {
                self.bookmarks.insert_bookmark(ctx, request.record()?).await?;
            }
            Verb::Get => {}
            Verb::Delete => return Err(ApiError::bad_request("Use DELETE /bookmarks/:id")),
        }

        let records = self
            .bookmarks
            .fetch_entities_by_user_id(ctx, user, request.filters)
            .await?;
        Ok(ResourceResponse::Data(json_array(records)))
    }

    pub async fn mine(&self, ctx: &mut RequestContext, request: ResourceRequest) -> Result<ResourceResponse, ApiError> {
        let user = ctx.identity.id;
        self.process_user_bookmarks(ctx, user, request).await
    }

    /// Stored list-view preferences for the bookmark titled `title`
    pub async fn preferences(&self, ctx: &mut RequestContext, title: &str, filters: FilterData) -> Result<ResourceResponse, ApiError> {
        let user = ctx.identity.id;
        match self
            .preferences
            .fetch_entity_by_user_and_title(ctx, user, title, filters)
            .await?
        {
            Some(record) => Ok(ResourceResponse::Data(record.into())),
            None => Err(ApiError::not_found(BOOKMARK_NOT_FOUND)),
        }
    }
}
