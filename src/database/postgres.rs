use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgArguments, PgPool, Row};
use std::sync::Arc;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::record::EntityRecord;
use crate::database::schema::SchemaCatalog;
use crate::database::store::RowStore;
use crate::ddl::{Dialect, SchemaChange};
use crate::filter::filter_where::FilterWhere;
use crate::filter::{ColumnCasts, Filter, FilterData, SqlResult};
use crate::types::RecordId;

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, PgArguments>;

/// `RowStore` over a Postgres pool. Parameters are cast to the column
/// types the catalog knows, so text-borne values such as timestamps and
/// nulls reach typed columns intact.
pub struct PgStore {
    pool: PgPool,
    catalog: Arc<SchemaCatalog>,
    log_queries: bool,
}

impl PgStore {
    pub fn new(pool: PgPool, catalog: Arc<SchemaCatalog>, log_queries: bool) -> Self {
        Self { pool, catalog, log_queries }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn trace(&self, sql: &SqlResult) {
        if self.log_queries {
            tracing::debug!(params = sql.params.len(), "SQL: {}", sql.query);
        }
    }

    async fn casts(&self, table: &str) -> ColumnCasts {
        self.catalog.get(table).await.map(|schema| schema.casts()).unwrap_or_default()
    }

    fn query<'q>(&self, sql: &'q SqlResult) -> PgQuery<'q> {
        self.trace(sql);
        sql.params.iter().fold(sqlx::query(&sql.query), bind_param)
    }
}

fn quote(name: &str) -> Result<String, DatabaseError> {
    Ok(Dialect::Postgres.quote_identifier(name)?)
}

fn predicate(conditions: &Value, starting_param_index: usize, casts: &ColumnCasts) -> Result<(String, Vec<Value>), DatabaseError> {
    FilterWhere::validate(conditions)?;
    if conditions.is_null() {
        return Ok(("1=1".to_string(), vec![]));
    }
    Ok(FilterWhere::generate_typed(conditions, starting_param_index, casts)?)
}

/// row_to_json maps arbitrary column sets without per-type decoding
fn select_sql(table: &str, filter_data: FilterData, casts: ColumnCasts) -> Result<SqlResult, DatabaseError> {
    let mut filter = Filter::new(table)?;
    filter.assign(filter_data)?.with_casts(casts);
    let inner = filter.to_sql()?;
    Ok(SqlResult {
        query: format!("SELECT row_to_json(t) AS row FROM ({}) t", inner.query),
        params: inner.params,
    })
}

fn insert_sql(table: &str, record: &EntityRecord, casts: &ColumnCasts) -> Result<SqlResult, DatabaseError> {
    let table_sql = quote(table)?;
    if record.is_empty() {
        return Ok(SqlResult {
            query: format!("INSERT INTO {} DEFAULT VALUES RETURNING \"id\"", table_sql),
            params: vec![],
        });
    }

    let mut columns = Vec::with_capacity(record.len());
    let mut placeholders = Vec::with_capacity(record.len());
    let mut params = Vec::with_capacity(record.len());
    for (index, (column, value)) in record.iter().enumerate() {
        columns.push(quote(column)?);
        placeholders.push(casts.placeholder(column, index + 1));
        params.push(casts.prepare(column, value));
    }
    Ok(SqlResult {
        query: format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING \"id\"",
            table_sql,
            columns.join(", "),
            placeholders.join(", ")
        ),
        params,
    })
}

/// With no values to set this counts the rows the conditions reach instead
fn update_sql(table: &str, values: &EntityRecord, conditions: &Value, casts: &ColumnCasts) -> Result<SqlResult, DatabaseError> {
    let table_sql = quote(table)?;
    let mut assignments = Vec::with_capacity(values.len());
    let mut params = Vec::with_capacity(values.len());
    for (index, (column, value)) in values.iter().enumerate() {
        assignments.push(format!("{} = {}", quote(column)?, casts.placeholder(column, index + 1)));
        params.push(casts.prepare(column, value));
    }
    let (predicate, predicate_params) = predicate(conditions, params.len(), casts)?;
    params.extend(predicate_params);

    let query = if assignments.is_empty() {
        format!("SELECT COUNT(*) AS count FROM {} WHERE {}", table_sql, predicate)
    } else {
        format!("UPDATE {} SET {} WHERE {}", table_sql, assignments.join(", "), predicate)
    };
    Ok(SqlResult { query, params })
}

fn delete_sql(table: &str, conditions: &Value, casts: &ColumnCasts) -> Result<SqlResult, DatabaseError> {
    let table_sql = quote(table)?;
    let (predicate, params) = predicate(conditions, 0, casts)?;
    Ok(SqlResult {
        query: format!("DELETE FROM {} WHERE {}", table_sql, predicate),
        params,
    })
}

#[async_trait]
impl RowStore for PgStore {
    async fn select(&self, table: &str, filter_data: FilterData) -> Result<Vec<EntityRecord>, DatabaseError> {
        let sql = select_sql(table, filter_data, self.casts(table).await)?;
        let rows = self.query(&sql).fetch_all(&self.pool).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match row.try_get::<Value, _>("row")? {
                Value::Object(map) => records.push(EntityRecord::from_map(map)),
                other => {
                    return Err(DatabaseError::QueryError(format!("unexpected row format: {}", other)));
                }
            }
        }
        Ok(records)
    }

    async fn insert(&self, table: &str, record: &EntityRecord) -> Result<RecordId, DatabaseError> {
        let sql = insert_sql(table, record, &self.casts(table).await)?;
        let row = self.query(&sql).fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>("id")?)
    }

    async fn update(&self, table: &str, values: &EntityRecord, conditions: &Value) -> Result<u64, DatabaseError> {
        let sql = update_sql(table, values, conditions, &self.casts(table).await)?;
        if values.is_empty() {
            let row = self.query(&sql).fetch_one(&self.pool).await?;
            let count: i64 = row.try_get("count")?;
            return Ok(count.max(0) as u64);
        }
        Ok(self.query(&sql).execute(&self.pool).await?.rows_affected())
    }

    async fn delete(&self, table: &str, conditions: &Value) -> Result<u64, DatabaseError> {
        let sql = delete_sql(table, conditions, &self.casts(table).await)?;
        Ok(self.query(&sql).execute(&self.pool).await?.rows_affected())
    }

    async fn apply_schema(&self, change: &SchemaChange) -> Result<(), DatabaseError> {
        let ddl = change.to_sql(Dialect::Postgres)?;
        tracing::info!("Applying DDL on '{}': {}", change.table(), ddl);
        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }
}

fn bind_param<'q>(q: PgQuery<'q>, v: &'q Value) -> PgQuery<'q> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                // Postgres doesn't have u64; values past i64 travel as text
                q.bind(u.to_string())
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        // JSONB
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::TableSchema;
    use crate::ddl::{ColumnDefinition, StorageType};
    use serde_json::json;

    fn events() -> ColumnCasts {
        TableSchema::new("events")
            .unwrap()
            .column(ColumnDefinition::new("starts_at").set_type(StorageType::DateTime))
            .column(ColumnDefinition::new("seats").set_type(StorageType::Integer))
            .column(ColumnDefinition::new("details").set_type(StorageType::Json))
            .column(ColumnDefinition::new("title").set_type(StorageType::Varchar))
            .casts()
    }

    fn record(value: Value) -> EntityRecord {
        EntityRecord::from_payload(value).unwrap()
    }

    #[test]
    fn insert_casts_text_and_null_to_column_types() {
        let values = record(json!({
            "starts_at": "2024-05-01T09:00:00Z",
            "seats": null,
            "details": { "room": "A" }
        }));
        let sql = insert_sql("events", &values, &events()).unwrap();
        assert_eq!(
            sql.query,
            "INSERT INTO \"events\" (\"details\", \"seats\", \"starts_at\") \
             VALUES ($1::jsonb, $2::integer, $3::timestamptz) RETURNING \"id\""
        );
        assert_eq!(sql.params, vec![json!(r#"{"room":"A"}"#), Value::Null, json!("2024-05-01T09:00:00Z")]);
    }

    #[test]
    fn update_casts_assignments_and_predicate() {
        let values = record(json!({ "starts_at": "2024-06-01T09:00:00Z" }));
        let sql = update_sql("events", &values, &json!({ "id": 4, "title": { "$ilike": "%demo%" } }), &events()).unwrap();
        assert_eq!(
            sql.query,
            "UPDATE \"events\" SET \"starts_at\" = $1::timestamptz WHERE \"id\" = $2::bigint AND \"title\" ILIKE $3"
        );

        let sql = update_sql("events", &EntityRecord::new(), &json!({ "seats": { "$gt": 10 } }), &events()).unwrap();
        assert_eq!(sql.query, "SELECT COUNT(*) AS count FROM \"events\" WHERE \"seats\" > $1::integer");
    }

    #[test]
    fn select_and_delete_share_the_casts() {
        let filters = FilterData {
            where_clause: Some(json!({ "starts_at": { "$gte": "2024-01-01" } })),
            ..Default::default()
        };
        let sql = select_sql("events", filters, events()).unwrap();
        assert!(sql.query.contains("WHERE \"starts_at\" >= $1::timestamptz"), "{}", sql.query);

        let sql = delete_sql("events", &json!({ "id": 3 }), &events()).unwrap();
        assert_eq!(sql.query, "DELETE FROM \"events\" WHERE \"id\" = $1::bigint");

        // tables unknown to the catalog bind untyped
        let sql = delete_sql("events", &json!({ "id": 3 }), &ColumnCasts::default()).unwrap();
        assert_eq!(sql.query, "DELETE FROM \"events\" WHERE \"id\" = $1");
    }
}
