use super::context::RequestContext;
use super::error::GatewayError;
use super::relational::RelationalGateway;
use super::strategy::{OwnerStamp, SecondaryKey};
use crate::acl::DEFAULT_OWNER_COLUMN;
use crate::database::EntityRecord;
use crate::filter::FilterData;
use crate::types::RecordId;

/// Column pairing a preference row with the bookmark that created it
pub const TITLE_COLUMN: &str = "title";

/// Per-user view preferences, keyed by owner and title
#[derive(Clone)]
pub struct PreferenceGateway {
    inner: RelationalGateway,
    stamp: OwnerStamp,
    key: SecondaryKey,
}

impl PreferenceGateway {
    pub fn new(inner: RelationalGateway) -> Self {
        let owner = inner
            .schema()
            .owner_column
            .clone()
            .unwrap_or_else(|| DEFAULT_OWNER_COLUMN.to_string());
        Self {
            inner,
            stamp: OwnerStamp::new(owner.clone()),
            key: SecondaryKey::new(owner, TITLE_COLUMN),
        }
    }

    pub fn relational(&self) -> &RelationalGateway {
        &self.inner
    }

    pub async fn insert_preference(&self, ctx: &mut RequestContext, mut payload: EntityRecord) -> Result<RecordId, GatewayError> {
        self.stamp.apply(&mut payload, ctx.identity.id);
        self.inner.insert(ctx, payload).await
    }

    /// `None` when no row matches; absence is a normal outcome here, not an error
    pub async fn fetch_entity_by_user_and_title(
        &self,
        ctx: &mut RequestContext,
        user: RecordId,
        title: &str,
        filters: FilterData,
    ) -> Result<Option<EntityRecord>, GatewayError> {
        self.inner.fetch_one_where(ctx, self.key.condition(user, title), filters).await
    }

    pub async fn delete_by_user_and_title(&self, ctx: &mut RequestContext, user: RecordId, title: &str) -> Result<u64, GatewayError> {
        self.inner.delete_where(ctx, self.key.condition(user, title)).await
    }
}
