//! Runtime table definitions: the DDL source for schema changes and the
//! validation source for every record written through a gateway.

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::database::manager::DatabaseError;
use crate::database::record::EntityRecord;
use crate::database::store::RowStore;
use crate::ddl::column::parse_length_list;
use crate::ddl::{validate_identifier, ColumnDefinition, ColumnLength, DdlError, LengthValue, SchemaChange, StorageType};
use crate::filter::{ColumnCasts, FilterData};

pub const BOOKMARKS_TABLE: &str = "directus_bookmarks";
pub const PREFERENCES_TABLE: &str = "directus_preferences";
/// Meta table recording runtime table columns; its create permission governs schema changes
pub const COLUMNS_TABLE: &str = "directus_columns";

const META_PAGE: i32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    /// Column holding the owning identity, for owned resources
    pub owner_column: Option<String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Result<Self, DdlError> {
        let name = name.into();
        validate_identifier(&name)?;
        Ok(Self { name, columns: vec![], owner_column: None })
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn owned_by(mut self, column: impl Into<String>) -> Self {
        self.owner_column = Some(column.into());
        self
    }

    pub fn find_column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// `id` is implicit on every table
    pub fn has_column(&self, name: &str) -> bool {
        name == "id" || self.find_column(name).is_some()
    }

    /// Parameter casts for every typed column, `id` included
    pub fn casts(&self) -> ColumnCasts {
        self.columns
            .iter()
            .filter_map(|c| Some((c.name(), c.storage_type()?.postgres_cast())))
            .fold(ColumnCasts::new().with("id", "bigint"), |casts, (name, pg_type)| casts.with(name, pg_type))
    }

    pub fn create_change(&self) -> SchemaChange {
        SchemaChange::CreateTable {
            table: self.name.clone(),
            columns: self.columns.clone(),
        }
    }
}

fn owner() -> ColumnDefinition {
    ColumnDefinition::new("user").set_type(StorageType::Integer).set_nullable(false)
}

fn varchar(name: &str, length: i64) -> Result<ColumnDefinition, DdlError> {
    ColumnDefinition::new(name).set_type(StorageType::Varchar).set_length(length)
}

pub fn bookmarks_schema() -> Result<TableSchema, DdlError> {
    Ok(TableSchema::new(BOOKMARKS_TABLE)?
        .owned_by("user")
        .column(owner())
        .column(varchar("title", 255)?.set_nullable(false))
        .column(varchar("url", 255)?)
        .column(varchar("icon_class", 255)?)
        .column(
            ColumnDefinition::new("section")
                .set_type(StorageType::Enum)
                .set_length(vec!["search", "other"])?
                .set_default("other"),
        ))
}

pub fn preferences_schema() -> Result<TableSchema, DdlError> {
    Ok(TableSchema::new(PREFERENCES_TABLE)?
        .owned_by("user")
        .column(owner())
        .column(varchar("table_name", 64)?)
        .column(varchar("title", 255)?)
        .column(varchar("columns_visible", 300)?)
        .column(varchar("sort", 64)?)
        .column(
            ColumnDefinition::new("sort_order")
                .set_type(StorageType::Enum)
                .set_length(vec!["ASC", "DESC"])?
                .set_default("ASC"),
        )
        .column(varchar("status", 64)?)
        .column(ColumnDefinition::new("search_string").set_type(StorageType::Text))
        .column(ColumnDefinition::new("list_view_options").set_type(StorageType::Text)))
}

/// One row per column of every table defined at runtime
pub fn columns_schema() -> Result<TableSchema, DdlError> {
    Ok(TableSchema::new(COLUMNS_TABLE)?
        .column(varchar("table_name", 64)?.set_nullable(false))
        .column(varchar("column_name", 64)?.set_nullable(false))
        .column(varchar("data_type", 64)?.set_nullable(false))
        .column(ColumnDefinition::new("length").set_type(StorageType::Text))
        .column(ColumnDefinition::new("scale").set_type(StorageType::Integer))
        .column(ColumnDefinition::new("nullable").set_type(StorageType::Boolean).set_default("true"))
        .column(ColumnDefinition::new("default_value").set_type(StorageType::Text))
        .column(ColumnDefinition::new("is_owner").set_type(StorageType::Boolean).set_default("false"))
        .column(ColumnDefinition::new("sort").set_type(StorageType::Integer)))
}

fn is_system_table(name: &str) -> bool {
    matches!(name, BOOKMARKS_TABLE | PREFERENCES_TABLE | COLUMNS_TABLE)
}

/// Meta row describing `column` as the `sort`-th column of `table`
pub fn column_meta(table: &str, column: &ColumnDefinition, owner: bool, sort: usize) -> EntityRecord {
    let length = match column.length() {
        Some(ColumnLength::Precision(p)) => Value::from(p.to_string()),
        Some(ColumnLength::Values(rendered)) => Value::from(rendered.clone()),
        None => Value::Null,
    };
    let mut record = EntityRecord::new();
    record
        .set("table_name", table)
        .set("column_name", column.name())
        .set("data_type", column.storage_type().map(|t| t.as_str()).unwrap_or("text"))
        .set("length", length)
        .set("scale", column.scale())
        .set("nullable", column.is_nullable())
        .set("default_value", column.default_value())
        .set("is_owner", owner)
        .set("sort", sort as i64);
    record
}

fn text_field<'a>(row: &'a EntityRecord, field: &str) -> Result<&'a str, DdlError> {
    row.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| DdlError::InvalidIdentifier(format!("column meta row lacks '{}'", field)))
}

/// Inverse of [`column_meta`]
fn column_from_meta(row: &EntityRecord) -> Result<ColumnDefinition, DdlError> {
    let storage_type: StorageType = text_field(row, "data_type")?.parse()?;
    let mut column = ColumnDefinition::new(text_field(row, "column_name")?).set_type(storage_type);

    if let Some(length) = row.get("length").and_then(Value::as_str) {
        column = match storage_type {
            StorageType::Enum => column.set_length(parse_length_list(length)?)?,
            _ => column.set_length(LengthValue::Text(length.to_string()))?,
        };
    }
    if let Some(scale) = row.get("scale").and_then(Value::as_u64) {
        column = column.set_scale(scale as u32);
    }
    if let Some(nullable) = row.get("nullable").and_then(Value::as_bool) {
        column = column.set_nullable(nullable);
    }
    if let Some(default) = row.get("default_value").and_then(Value::as_str) {
        column = column.set_default(default);
    }
    Ok(column)
}

/// Known table definitions, shared by every request
#[derive(Debug, Default)]
pub struct SchemaCatalog {
    tables: RwLock<HashMap<String, TableSchema>>,
    changes: Mutex<()>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog preloaded with the bookmark, preference and column meta tables
    pub fn with_system_tables() -> Result<Self, DdlError> {
        let tables: HashMap<String, TableSchema> = [bookmarks_schema()?, preferences_schema()?, columns_schema()?]
            .into_iter()
            .map(|schema| (schema.name.clone(), schema))
            .collect();
        Ok(Self { tables: RwLock::new(tables), changes: Mutex::new(()) })
    }

    /// Serializes schema changes; hold the guard from the existence check until registration
    pub async fn lock_changes(&self) -> MutexGuard<'_, ()> {
        self.changes.lock().await
    }

    /// Register every runtime table recorded in the column meta table, returning how many were added
    pub async fn load_from(&self, store: &dyn RowStore) -> Result<usize, DatabaseError> {
        let mut recorded: BTreeMap<String, TableSchema> = BTreeMap::new();
        let mut offset = 0;
        loop {
            let page = FilterData {
                order: Some(json!("table_name asc, sort asc, id asc")),
                limit: Some(META_PAGE),
                offset: Some(offset),
                ..Default::default()
            };
            let rows = store.select(COLUMNS_TABLE, page).await?;
            if rows.is_empty() {
                break;
            }
            offset += rows.len() as i32;

            for row in &rows {
                let table = text_field(row, "table_name")?;
                let schema = match recorded.entry(table.to_string()) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => entry.insert(TableSchema::new(table)?),
                };
                let column = column_from_meta(row)?;
                if row.get("is_owner").and_then(Value::as_bool).unwrap_or(false) {
                    schema.owner_column = Some(column.name().to_string());
                }
                schema.columns.push(column);
            }
        }

        let mut tables = self.tables.write().await;
        let mut loaded = 0;
        for (name, schema) in recorded {
            if is_system_table(&name) || tables.contains_key(&name) {
                tracing::debug!("Skipping recorded table '{}': already catalogued", name);
                continue;
            }
            tables.insert(name, schema);
            loaded += 1;
        }
        Ok(loaded)
    }

    pub async fn get(&self, table: &str) -> Option<TableSchema> {
        self.tables.read().await.get(table).cloned()
    }

    pub async fn contains(&self, table: &str) -> bool {
        self.tables.read().await.contains_key(table)
    }

    pub async fn register(&self, schema: TableSchema) {
        self.tables.write().await.insert(schema.name.clone(), schema);
    }

    pub async fn add_column(&self, table: &str, column: ColumnDefinition) -> Result<(), DdlError> {
        let mut tables = self.tables.write().await;
        let schema = tables
            .get_mut(table)
            .ok_or_else(|| DdlError::InvalidIdentifier(format!("unknown table '{}'", table)))?;
        if schema.has_column(column.name()) {
            return Err(DdlError::DuplicateColumn {
                table: table.to_string(),
                column: column.name().to_string(),
            });
        }
        schema.columns.push(column);
        Ok(())
    }

    /// Every catalogued schema, sorted by name
    pub async fn schemas(&self) -> Vec<TableSchema> {
        let mut schemas: Vec<TableSchema> = self.tables.read().await.values().cloned().collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::ddl::Dialect;

    #[test]
    fn system_schemas_render_to_ddl() {
        let sql = bookmarks_schema().unwrap().create_change().to_sql(Dialect::Postgres).unwrap();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"directus_bookmarks\" (\"id\" BIGSERIAL PRIMARY KEY"));
        assert!(sql.contains("\"section\" TEXT DEFAULT 'other' CHECK (\"section\" IN ('search', 'other'))"));

        let sql = preferences_schema().unwrap().create_change().to_sql(Dialect::MySql).unwrap();
        assert!(sql.contains("`sort_order` ENUM(\"ASC\",\"DESC\") DEFAULT 'ASC'"));
    }

    #[tokio::test]
    async fn catalog_registers_and_extends_tables() {
        let catalog = SchemaCatalog::with_system_tables().unwrap();
        assert!(catalog.contains(BOOKMARKS_TABLE).await);
        assert!(!catalog.contains("notes").await);

        catalog.register(TableSchema::new("notes").unwrap()).await;
        catalog
            .add_column("notes", ColumnDefinition::new("body").set_type(StorageType::Text))
            .await
            .unwrap();
        assert!(catalog.get("notes").await.unwrap().has_column("body"));

        let dup = catalog
            .add_column("notes", ColumnDefinition::new("body").set_type(StorageType::Text))
            .await;
        assert!(matches!(dup, Err(DdlError::DuplicateColumn { .. })));

        let names: Vec<String> = catalog.schemas().await.into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["directus_bookmarks", "directus_columns", "directus_preferences", "notes"]);
    }

    #[tokio::test]
    async fn recorded_tables_survive_a_fresh_catalog() {
        let store = MemoryStore::new();
        store.apply_schema(&columns_schema().unwrap().create_change()).await.unwrap();

        let stage = ColumnDefinition::new("stage")
            .set_type(StorageType::Enum)
            .set_length(vec!["draft", "it's \"live\""])
            .unwrap()
            .set_default("draft");
        let columns = [
            ColumnDefinition::new("author").set_type(StorageType::Integer).set_nullable(false),
            ColumnDefinition::new("price")
                .set_type(StorageType::Decimal)
                .set_length(10_i64)
                .unwrap()
                .set_scale(2),
            stage,
        ];
        for (sort, column) in columns.iter().enumerate() {
            let row = column_meta("notes", column, column.name() == "author", sort);
            store.insert(COLUMNS_TABLE, &row).await.unwrap();
        }

        let catalog = SchemaCatalog::with_system_tables().unwrap();
        assert_eq!(catalog.load_from(&store).await.unwrap(), 1);
        let notes = catalog.get("notes").await.unwrap();
        assert_eq!(notes.owner_column.as_deref(), Some("author"));
        assert_eq!(notes.columns, columns.to_vec());

        // a second load leaves catalogued tables alone
        assert_eq!(catalog.load_from(&store).await.unwrap(), 0);
    }
}
