use serde_json::json;

use super::context::RequestContext;
use super::error::GatewayError;
use super::relational::{DeleteOutcome, RelationalGateway};
use super::strategy::OwnerStamp;
use crate::acl::DEFAULT_OWNER_COLUMN;
use crate::database::EntityRecord;
use crate::filter::FilterData;
use crate::types::RecordId;

/// Bookmarks: rows owned by a user, always stamped with their creator
#[derive(Clone)]
pub struct BookmarkGateway {
    inner: RelationalGateway,
    stamp: OwnerStamp,
}

impl BookmarkGateway {
    pub fn new(inner: RelationalGateway) -> Self {
        let column = inner
            .schema()
            .owner_column
            .clone()
            .unwrap_or_else(|| DEFAULT_OWNER_COLUMN.to_string());
        Self { inner, stamp: OwnerStamp::new(column) }
    }

    pub fn relational(&self) -> &RelationalGateway {
        &self.inner
    }

    pub fn owner_column(&self) -> &str {
        self.stamp.column()
    }

    pub async fn insert_bookmark(&self, ctx: &mut RequestContext, mut payload: EntityRecord) -> Result<RecordId, GatewayError> {
        self.stamp.apply(&mut payload, ctx.identity.id);
        self.inner.insert(ctx, payload).await
    }

    pub async fn update_bookmark(&self, ctx: &mut RequestContext, payload: EntityRecord) -> Result<RecordId, GatewayError> {
        self.inner.update(ctx, payload).await
    }

    pub async fn fetch_by_id(&self, ctx: &mut RequestContext, id: RecordId) -> Result<EntityRecord, GatewayError> {
        self.inner.fetch_by_id(ctx, id).await
    }

    /// The bookmark `id` owned by `user`, subject to the caller's own scope as well
    pub async fn fetch_entity_by_user_and_id(
        &self,
        ctx: &mut RequestContext,
        user: RecordId,
        id: RecordId,
    ) -> Result<EntityRecord, GatewayError> {
        let conditions = json!({ "$and": [{ "id": id }, self.stamp.condition(user)] });
        self.inner
            .fetch_one_where(ctx, conditions, FilterData::default())
            .await?
            .ok_or_else(|| GatewayError::not_found(self.inner.table()))
    }

    pub async fn fetch_entities_by_user_id(
        &self,
        ctx: &mut RequestContext,
        user: RecordId,
        filters: FilterData,
    ) -> Result<Vec<EntityRecord>, GatewayError> {
        self.inner.fetch_all(ctx, filters.and_where(self.stamp.condition(user))).await
    }

    pub async fn fetch_all(&self, ctx: &mut RequestContext, filters: FilterData) -> Result<Vec<EntityRecord>, GatewayError> {
        self.inner.fetch_all(ctx, filters).await
    }

    pub async fn delete(&self, ctx: &mut RequestContext, id: RecordId) -> Result<DeleteOutcome, GatewayError> {
        self.inner.delete(ctx, id).await
    }
}
