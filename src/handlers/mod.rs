// handlers/mod.rs - HTTP entry points
//
// Public routes (/, /health) need no identity. Everything else runs behind
// the JWT middleware, which injects the `Identity` extension these handlers read.
pub mod bookmarks;
pub mod items;
pub mod tables;

use std::sync::Arc;

use crate::acl::PermissionFilter;
use crate::config::AppConfig;
use crate::controller::BookmarksController;
use crate::database::{RowStore, SchemaCatalog, BOOKMARKS_TABLE, PREFERENCES_TABLE};
use crate::error::ApiError;
use crate::gateway::{BookmarkGateway, PreferenceGateway, RelationalGateway, RequestContext};
use crate::services::SchemaService;
use crate::types::Identity;

/// Shared, request-independent services
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn RowStore>,
    pub acl: Arc<dyn PermissionFilter>,
    pub catalog: Arc<SchemaCatalog>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn RowStore>,
        acl: Arc<dyn PermissionFilter>,
        catalog: Arc<SchemaCatalog>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            acl,
            catalog,
        }
    }

    /// Fresh per-request context; never shared between requests
    pub fn context(&self, identity: Identity) -> RequestContext {
        RequestContext::new(identity)
    }

    pub fn tag_header(&self) -> &str {
        &self.config.api.cache_tag_header
    }

    pub async fn gateway(&self, table: &str) -> Result<RelationalGateway, ApiError> {
        let schema = self
            .catalog
            .get(table)
            .await
            .ok_or_else(|| ApiError::not_found(format!("Unknown table '{}'", table)))?;
        Ok(RelationalGateway::new(schema, self.store.clone(), self.acl.clone()))
    }

    pub async fn bookmarks_controller(&self) -> Result<BookmarksController, ApiError> {
        let bookmarks = BookmarkGateway::new(self.gateway(BOOKMARKS_TABLE).await?);
        let preferences = PreferenceGateway::new(self.gateway(PREFERENCES_TABLE).await?);
        Ok(BookmarksController::new(bookmarks, preferences))
    }

    pub fn schema_service(&self) -> SchemaService {
        SchemaService::new(self.store.clone(), self.acl.clone(), self.catalog.clone())
    }
}
