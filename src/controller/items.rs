use serde_json::Value;

use super::request::{ResourceRequest, ResourceResponse, Verb};
use crate::error::ApiError;
use crate::gateway::{DeleteOutcome, RelationalGateway, RequestContext};

/// Plain CRUD over any catalogued table
pub struct ItemsController {
    gateway: RelationalGateway,
}

impl ItemsController {
    pub fn new(gateway: RelationalGateway) -> Self {
        Self { gateway }
    }

    pub async fn handle(&self, ctx: &mut RequestContext, request: ResourceRequest) -> Result<ResourceResponse, ApiError> {
        match (request.verb, request.id) {
            (Verb::Get, None) => {
                let records = self.gateway.fetch_all(ctx, request.filters).await?;
                Ok(ResourceResponse::Data(Value::Array(records.into_iter().map(Value::from).collect())))
            }
            (Verb::Get, Some(id)) => Ok(ResourceResponse::Data(self.gateway.fetch_by_id(ctx, id).await?.into())),
            (Verb::Post, None) => {
                let id = self.gateway.insert(ctx, request.record()?).await?;
                let record = self.gateway.fetch_by_id(ctx, id).await?;
                Ok(ResourceResponse::Created(record.into()))
            }
            (Verb::Put | Verb::Patch, _) => {
                let id = self.gateway.update(ctx, request.update_record()?).await?;
                Ok(ResourceResponse::Data(self.gateway.fetch_by_id(ctx, id).await?.into()))
            }
            (Verb::Delete, Some(id)) => match self.gateway.delete(ctx, id).await? {
                DeleteOutcome::Deleted => Ok(ResourceResponse::Empty),
                DeleteOutcome::NotFound => Err(ApiError::not_found(format!(
                    "Record {} not found in '{}'",
                    id,
                    self.gateway.table()
                ))),
            },
            (Verb::Post, Some(_)) => Err(ApiError::bad_request("POST creates a new item; omit the id")),
            (Verb::Delete, None) => Err(ApiError::bad_request("Item id is required")),
        }
    }
}
