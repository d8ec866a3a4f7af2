use async_trait::async_trait;
use serde_json::Value;

use crate::database::manager::DatabaseError;
use crate::database::record::EntityRecord;
use crate::ddl::SchemaChange;
use crate::filter::FilterData;
use crate::types::RecordId;

/// Statement-level access to relational storage.
///
/// Each call is one statement; `conditions` use the where language of
/// [`crate::filter`]. Permission scoping happens above this seam.
#[async_trait]
pub trait RowStore: Send + Sync {
    async fn select(&self, table: &str, filter: FilterData) -> Result<Vec<EntityRecord>, DatabaseError>;

    /// Insert one row and return its assigned `id`
    async fn insert(&self, table: &str, record: &EntityRecord) -> Result<RecordId, DatabaseError>;

    /// Update matching rows, returning how many were affected
    async fn update(&self, table: &str, values: &EntityRecord, conditions: &Value) -> Result<u64, DatabaseError>;

    /// Delete matching rows, returning how many were affected
    async fn delete(&self, table: &str, conditions: &Value) -> Result<u64, DatabaseError>;

    async fn apply_schema(&self, change: &SchemaChange) -> Result<(), DatabaseError>;

    /// Connectivity probe for the health endpoint
    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}
