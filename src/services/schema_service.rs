use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::acl::PermissionFilter;
use crate::database::schema::column_meta;
use crate::database::{DatabaseError, RowStore, SchemaCatalog, TableSchema, COLUMNS_TABLE};
use crate::ddl::{validate_identifier, ColumnDefinition, DdlError, Dialect, LengthValue, SchemaChange, StorageType};
use crate::error::ApiError;
use crate::gateway::{GatewayError, RequestContext};
use crate::types::Operation;

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error(transparent)]
    Ddl(#[from] DdlError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("Table already exists: {0}")]
    AlreadyExists(String),
    #[error("Table not found: {0}")]
    NotFound(String),
    #[error("Owner column '{0}' is not among the table's columns")]
    UnknownOwnerColumn(String),
}

impl From<SchemaError> for ApiError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::Ddl(e) => e.into(),
            SchemaError::Gateway(e) => e.into(),
            SchemaError::Database(e) => e.into(),
            SchemaError::AlreadyExists(_) => ApiError::conflict(err.to_string()),
            SchemaError::NotFound(_) => ApiError::not_found(err.to_string()),
            SchemaError::UnknownOwnerColumn(_) => ApiError::validation_error(err.to_string(), None),
        }
    }
}

/// Column description as submitted by an administrator
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub storage_type: String,
    /// Precision as a number or numeric string, or the enumerated values
    #[serde(default)]
    pub length: Option<Value>,
    #[serde(default)]
    pub scale: Option<u32>,
    #[serde(default)]
    pub nullable: Option<bool>,
    #[serde(default)]
    pub default: Option<Value>,
}

impl ColumnSpec {
    pub fn into_definition(self) -> Result<ColumnDefinition, DdlError> {
        validate_identifier(&self.name)?;
        let mut column = ColumnDefinition::new(self.name).set_type(StorageType::from_str(&self.storage_type)?);

        if let Some(length) = self.length.as_ref().filter(|v| !v.is_null()) {
            column = column.set_length(LengthValue::try_from(length)?)?;
        }
        if let Some(scale) = self.scale {
            column = column.set_scale(scale);
        }
        if let Some(nullable) = self.nullable {
            column = column.set_nullable(nullable);
        }
        match self.default {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) => column = column.set_default(s),
            Some(other) => column = column.set_default(other.to_string()),
        }
        Ok(column)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableSpec {
    pub table: String,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub owner_column: Option<String>,
}

/// Runtime table definition: permission check, DDL, storage, catalog, cache tags
pub struct SchemaService {
    store: Arc<dyn RowStore>,
    acl: Arc<dyn PermissionFilter>,
    catalog: Arc<SchemaCatalog>,
}

impl SchemaService {
    pub fn new(store: Arc<dyn RowStore>, acl: Arc<dyn PermissionFilter>, catalog: Arc<SchemaCatalog>) -> Self {
        Self { store, acl, catalog }
    }

    fn authorize(&self, ctx: &RequestContext) -> Result<(), SchemaError> {
        let decision = self.acl.resolve(&ctx.identity, COLUMNS_TABLE, Operation::Create);
        if !decision.allowed {
            let reason = decision.denied_reason.unwrap_or_else(|| "schema changes are not permitted".to_string());
            tracing::warn!(request_id = %ctx.request_id, identity = ctx.identity.id, "Schema change denied: {}", reason);
            return Err(GatewayError::denied(COLUMNS_TABLE, Operation::Create, reason).into());
        }
        Ok(())
    }

    /// Render first so malformed definitions never reach storage
    async fn apply(&self, change: &SchemaChange) -> Result<(), SchemaError> {
        change.to_sql(Dialect::Postgres)?;
        self.store.apply_schema(change).await?;
        Ok(())
    }

    /// Record the column in the meta table so the catalog can be rebuilt on startup
    async fn record_column(&self, schema: &TableSchema, column: &ColumnDefinition, sort: usize) -> Result<(), SchemaError> {
        let owner = schema.owner_column.as_deref() == Some(column.name());
        self.store
            .insert(COLUMNS_TABLE, &column_meta(&schema.name, column, owner, sort))
            .await?;
        Ok(())
    }

    pub async fn create_table(&self, ctx: &mut RequestContext, spec: TableSpec) -> Result<TableSchema, SchemaError> {
        self.authorize(ctx)?;
        let _changes = self.catalog.lock_changes().await;
        if self.catalog.contains(&spec.table).await {
            return Err(SchemaError::AlreadyExists(spec.table));
        }

        let mut schema = TableSchema::new(spec.table)?;
        for column in spec.columns {
            schema = schema.column(column.into_definition()?);
        }
        if let Some(owner) = spec.owner_column {
            if schema.find_column(&owner).is_none() {
                return Err(SchemaError::UnknownOwnerColumn(owner));
            }
            schema = schema.owned_by(owner);
        }

        self.apply(&schema.create_change()).await?;
        for (sort, column) in schema.columns.iter().enumerate() {
            self.record_column(&schema, column, sort).await?;
        }
        self.catalog.register(schema.clone()).await;

        info!(request_id = %ctx.request_id, "Created table '{}' with {} columns", schema.name, schema.columns.len());
        ctx.tags.record_table(&schema.name);
        Ok(schema)
    }

    pub async fn add_column(&self, ctx: &mut RequestContext, table: &str, spec: ColumnSpec) -> Result<TableSchema, SchemaError> {
        self.authorize(ctx)?;
        let _changes = self.catalog.lock_changes().await;
        let schema = self
            .catalog
            .get(table)
            .await
            .ok_or_else(|| SchemaError::NotFound(table.to_string()))?;

        let column = spec.into_definition()?;
        if schema.has_column(column.name()) {
            return Err(DdlError::DuplicateColumn {
                table: table.to_string(),
                column: column.name().to_string(),
            }
            .into());
        }

        let change = SchemaChange::AddColumn { table: table.to_string(), column: column.clone() };
        self.apply(&change).await?;
        self.record_column(&schema, &column, schema.columns.len()).await?;
        self.catalog.add_column(table, column).await?;

        info!(request_id = %ctx.request_id, "Added column to table '{}'", table);
        ctx.tags.record_table(table);
        self.catalog
            .get(table)
            .await
            .ok_or_else(|| SchemaError::NotFound(table.to_string()))
    }
}
