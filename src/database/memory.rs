//! Process-local `RowStore`. Evaluates the same where language the SQL
//! compiler accepts, so gateways behave identically against either backend.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::database::manager::DatabaseError;
use crate::database::record::EntityRecord;
use crate::database::store::RowStore;
use crate::ddl::{validate_identifier, ColumnDefinition, DdlError, SchemaChange, StorageType};
use crate::filter::filter_where::FilterWhere;
use crate::filter::{Filter, FilterData, FilterError, FilterOp, FilterOrderInfo, FilterWhereInfo, SortDirection};
use crate::types::RecordId;

#[derive(Debug)]
struct MemoryTable {
    next_id: RecordId,
    columns: Vec<ColumnDefinition>,
    rows: BTreeMap<RecordId, Map<String, Value>>,
}

impl MemoryTable {
    fn new(columns: Vec<ColumnDefinition>) -> Self {
        Self { next_id: 1, columns, rows: BTreeMap::new() }
    }

    fn has_column(&self, name: &str) -> bool {
        name == "id" || self.columns.iter().any(|c| c.name() == name)
    }

    fn check_columns<'a>(&self, table: &str, names: impl IntoIterator<Item = &'a String>) -> Result<(), DatabaseError> {
        for name in names {
            if !self.has_column(name) {
                return Err(DatabaseError::QueryError(format!(
                    "column \"{}\" of relation \"{}\" does not exist",
                    name, table
                )));
            }
        }
        Ok(())
    }

    fn matching_ids(&self, conditions: &Value) -> Result<Vec<RecordId>, DatabaseError> {
        let mut ids = vec![];
        for (id, row) in &self.rows {
            if matches(row, conditions, self)? {
                ids.push(*id);
            }
        }
        Ok(ids)
    }
}

/// In-memory tables keyed by name
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, MemoryTable>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently held by `table`
    pub async fn row_count(&self, table: &str) -> usize {
        self.tables.read().await.get(table).map(|t| t.rows.len()).unwrap_or(0)
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn select(&self, table: &str, filter_data: FilterData) -> Result<Vec<EntityRecord>, DatabaseError> {
        let mut filter = Filter::new(table)?;
        filter.assign(filter_data)?;

        let tables = self.tables.read().await;
        let data = tables.get(table).ok_or_else(|| DatabaseError::UnknownTable(table.to_string()))?;

        let projection: Vec<String> = filter
            .select_columns()
            .iter()
            .filter(|c| c.as_str() != "*")
            .cloned()
            .collect();
        data.check_columns(table, &projection)?;
        data.check_columns(table, filter.order_data().iter().map(|o| &o.column))?;

        let mut rows: Vec<&Map<String, Value>> = match filter.where_data() {
            Some(conditions) => {
                let mut out = vec![];
                for row in data.rows.values() {
                    if matches(row, conditions, data)? {
                        out.push(row);
                    }
                }
                out
            }
            None => data.rows.values().collect(),
        };

        if !filter.order_data().is_empty() {
            rows.sort_by(|a, b| compare_rows(a, b, filter.order_data()));
        }

        let offset = filter.offset_value().unwrap_or(0).max(0) as usize;
        let limit = filter.limit_value().map(|l| l.max(0) as usize).unwrap_or(usize::MAX);

        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| {
                if projection.is_empty() {
                    EntityRecord::from_map(row.clone())
                } else {
                    let projected = projection
                        .iter()
                        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                        .collect();
                    EntityRecord::from_map(projected)
                }
            })
            .collect())
    }

    async fn insert(&self, table: &str, record: &EntityRecord) -> Result<RecordId, DatabaseError> {
        let mut tables = self.tables.write().await;
        let data = tables
            .get_mut(table)
            .ok_or_else(|| DatabaseError::UnknownTable(table.to_string()))?;
        data.check_columns(table, record.keys())?;

        let id = data.next_id;
        let mut row = Map::new();
        row.insert("id".to_string(), Value::from(id));
        for column in &data.columns {
            let value = match record.get(column.name()) {
                Some(value) => value.clone(),
                None => column_default(column),
            };
            if value.is_null() && !column.is_nullable() {
                return Err(DatabaseError::QueryError(format!(
                    "null value in column \"{}\" violates not-null constraint",
                    column.name()
                )));
            }
            row.insert(column.name().to_string(), value);
        }

        data.next_id += 1;
        data.rows.insert(id, row);
        Ok(id)
    }

    async fn update(&self, table: &str, values: &EntityRecord, conditions: &Value) -> Result<u64, DatabaseError> {
        FilterWhere::validate(conditions)?;
        let mut tables = self.tables.write().await;
        let data = tables
            .get_mut(table)
            .ok_or_else(|| DatabaseError::UnknownTable(table.to_string()))?;
        data.check_columns(table, values.keys())?;

        let ids = data.matching_ids(conditions)?;
        for id in &ids {
            if let Some(row) = data.rows.get_mut(id) {
                for (column, value) in values.iter() {
                    row.insert(column.clone(), value.clone());
                }
            }
        }
        Ok(ids.len() as u64)
    }

    async fn delete(&self, table: &str, conditions: &Value) -> Result<u64, DatabaseError> {
        FilterWhere::validate(conditions)?;
        let mut tables = self.tables.write().await;
        let data = tables
            .get_mut(table)
            .ok_or_else(|| DatabaseError::UnknownTable(table.to_string()))?;

        let ids = data.matching_ids(conditions)?;
        for id in &ids {
            data.rows.remove(id);
        }
        Ok(ids.len() as u64)
    }

    async fn apply_schema(&self, change: &SchemaChange) -> Result<(), DatabaseError> {
        validate_identifier(change.table())?;
        let mut tables = self.tables.write().await;
        match change {
            SchemaChange::CreateTable { table, columns } => {
                tables
                    .entry(table.clone())
                    .or_insert_with(|| MemoryTable::new(columns.clone()));
            }
            SchemaChange::AddColumn { table, column } => {
                let data = tables
                    .get_mut(table)
                    .ok_or_else(|| DatabaseError::UnknownTable(table.clone()))?;
                if data.has_column(column.name()) {
                    return Err(DdlError::DuplicateColumn {
                        table: table.clone(),
                        column: column.name().to_string(),
                    }
                    .into());
                }
                let fill = column_default(column);
                for row in data.rows.values_mut() {
                    row.insert(column.name().to_string(), fill.clone());
                }
                data.columns.push(column.clone());
            }
            SchemaChange::DropColumn { table, column } => {
                let data = tables
                    .get_mut(table)
                    .ok_or_else(|| DatabaseError::UnknownTable(table.clone()))?;
                data.columns.retain(|c| c.name() != column);
                for row in data.rows.values_mut() {
                    row.remove(column);
                }
            }
        }
        tracing::debug!("Applied schema change to in-memory table '{}'", change.table());
        Ok(())
    }
}

/// Typed value of a column's textual DEFAULT, or null
fn column_default(column: &ColumnDefinition) -> Value {
    let Some(raw) = column.default_value() else { return Value::Null };
    match column.storage_type() {
        Some(StorageType::Integer) | Some(StorageType::BigInteger) => {
            raw.parse::<i64>().map(Value::from).unwrap_or(Value::Null)
        }
        Some(StorageType::Decimal) | Some(StorageType::Float) => {
            raw.parse::<f64>().map(Value::from).unwrap_or(Value::Null)
        }
        Some(StorageType::Boolean) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" => Value::Bool(true),
            "0" | "false" => Value::Bool(false),
            _ => Value::Null,
        },
        Some(StorageType::Json) => serde_json::from_str(raw).unwrap_or(Value::Null),
        _ => Value::String(raw.to_string()),
    }
}

fn matches(row: &Map<String, Value>, conditions: &Value, table: &MemoryTable) -> Result<bool, DatabaseError> {
    let obj = match conditions {
        Value::Null => return Ok(true),
        Value::Object(obj) => obj,
        _ => return Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string()).into()),
    };

    for (key, value) in obj {
        let satisfied = match key.as_str() {
            "$and" | "$or" => {
                let branches = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", key)))?;
                let mut results = Vec::with_capacity(branches.len());
                for branch in branches {
                    results.push(matches(row, branch, table)?);
                }
                if key == "$and" {
                    results.iter().all(|r| *r)
                } else {
                    results.iter().any(|r| *r)
                }
            }
            "$not" => !matches(row, value, table)?,
            op if op.starts_with('$') => return Err(FilterError::UnsupportedOperator(op.to_string()).into()),
            field => {
                if !table.has_column(field) {
                    return Err(DatabaseError::QueryError(format!("column \"{}\" does not exist", field)));
                }
                let mut all = true;
                for condition in FilterWhere::parse_field_condition(field, value)? {
                    all &= evaluate(row.get(field).unwrap_or(&Value::Null), &condition)?;
                }
                all
            }
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

fn evaluate(actual: &Value, condition: &FilterWhereInfo) -> Result<bool, FilterError> {
    let data = &condition.data;
    Ok(match condition.operator {
        FilterOp::Eq if data.is_null() => actual.is_null(),
        FilterOp::Neq if data.is_null() => !actual.is_null(),
        FilterOp::Eq => loose_eq(actual, data),
        FilterOp::Neq => !actual.is_null() && !loose_eq(actual, data),
        FilterOp::Gt => compare(actual, data) == Some(Ordering::Greater),
        FilterOp::Gte => matches!(compare(actual, data), Some(Ordering::Greater | Ordering::Equal)),
        FilterOp::Lt => compare(actual, data) == Some(Ordering::Less),
        FilterOp::Lte => matches!(compare(actual, data), Some(Ordering::Less | Ordering::Equal)),
        FilterOp::Like | FilterOp::NLike | FilterOp::ILike => {
            let (Some(text), Some(pattern)) = (actual.as_str(), data.as_str()) else {
                return Ok(false);
            };
            match condition.operator {
                FilterOp::Like => like(text, pattern),
                FilterOp::NLike => !like(text, pattern),
                _ => like(&text.to_lowercase(), &pattern.to_lowercase()),
            }
        }
        FilterOp::In | FilterOp::NIn => {
            let values = data
                .as_array()
                .ok_or_else(|| FilterError::InvalidOperatorData("$in/$nin requires array".to_string()))?;
            if values.is_empty() {
                condition.operator == FilterOp::NIn
            } else if actual.is_null() {
                false
            } else {
                let found = values.iter().any(|v| loose_eq(actual, v));
                found == (condition.operator == FilterOp::In)
            }
        }
        FilterOp::Between => match data {
            Value::Array(bounds) if bounds.len() == 2 => {
                matches!(compare(actual, &bounds[0]), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(compare(actual, &bounds[1]), Some(Ordering::Less | Ordering::Equal))
            }
            _ => return Err(FilterError::InvalidOperatorData("$between requires exactly 2 values".to_string())),
        },
        FilterOp::Null => match data {
            Value::Bool(expect_null) => actual.is_null() == *expect_null,
            _ => return Err(FilterError::InvalidOperatorData("$null requires a boolean".to_string())),
        },
    })
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Equality with SQL-style numeric coercion: `1`, `1.0` and `"1"` agree
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a.is_null() || b.is_null() {
        return false;
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(_), _) | (_, Value::Number(_)) => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        _ => a == b,
    }
}

/// Ordering between two non-null scalars; `None` when either is null or they are incomparable
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => as_number(a)?.partial_cmp(&as_number(b)?),
    }
}

/// Nulls sort last ascending and first descending, as Postgres does
fn compare_rows(a: &Map<String, Value>, b: &Map<String, Value>, order: &[FilterOrderInfo]) -> Ordering {
    for info in order {
        let left = a.get(&info.column).unwrap_or(&Value::Null);
        let right = b.get(&info.column).unwrap_or(&Value::Null);
        let ordering = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => compare(left, right).unwrap_or(Ordering::Equal),
        };
        let ordering = match info.sort {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// SQL LIKE: `%` matches any run, `_` exactly one character
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::bookmarks_schema;
    use serde_json::json;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .apply_schema(&bookmarks_schema().unwrap().create_change())
            .await
            .unwrap();
        for (user, title) in [(1, "Dash"), (2, "Posts"), (1, "Archive"), (1, "drafts")] {
            let record = EntityRecord::from_payload(json!({ "user": user, "title": title })).unwrap();
            store.insert("directus_bookmarks", &record).await.unwrap();
        }
        store
    }

    fn titles(records: &[EntityRecord]) -> Vec<&str> {
        records.iter().filter_map(|r| r.get("title")?.as_str()).collect()
    }

    #[test]
    fn like_wildcards() {
        assert!(like("Dashboard", "Dash%"));
        assert!(like("Dashboard", "%board"));
        assert!(like("Dash", "D_sh"));
        assert!(like("", "%"));
        assert!(!like("Dash", "D_s"));
        assert!(!like("Posts", "Dash%"));
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids_and_defaults() {
        let store = seeded().await;
        let rows = store.select("directus_bookmarks", FilterData::default()).await.unwrap();
        assert_eq!(rows.iter().map(|r| r.id().unwrap()).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(rows[0].get("section"), Some(&json!("other")));
        assert_eq!(rows[0].get("url"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn where_order_and_paging() {
        let store = seeded().await;
        let filter = FilterData {
            where_clause: Some(json!({ "user": 1, "title": { "$ilike": "d%" } })),
            order: Some(json!("title desc")),
            ..Default::default()
        };
        let rows = store.select("directus_bookmarks", filter).await.unwrap();
        assert_eq!(titles(&rows), vec!["drafts", "Dash"]);

        let filter = FilterData {
            where_clause: Some(json!({ "$or": [{ "user": 2 }, { "id": { "$in": [1, "3"] } }] })),
            order: Some(json!("-id")),
            limit: Some(2),
            offset: Some(1),
            ..Default::default()
        };
        let rows = store.select("directus_bookmarks", filter).await.unwrap();
        assert_eq!(titles(&rows), vec!["Posts", "Dash"]);
    }

    #[tokio::test]
    async fn update_and_delete_report_affected_rows() {
        let store = seeded().await;
        let values = EntityRecord::from_payload(json!({ "url": "/tables/posts" })).unwrap();
        let n = store
            .update("directus_bookmarks", &values, &json!({ "user": 1 }))
            .await
            .unwrap();
        assert_eq!(n, 3);

        assert_eq!(store.delete("directus_bookmarks", &json!({ "id": 99 })).await.unwrap(), 0);
        assert_eq!(store.delete("directus_bookmarks", &json!({ "user": { "$neq": 1 } })).await.unwrap(), 1);
        assert_eq!(store.row_count("directus_bookmarks").await, 3);
    }

    #[tokio::test]
    async fn unknown_tables_and_columns_are_errors() {
        let store = seeded().await;
        assert!(matches!(
            store.select("missing", FilterData::default()).await,
            Err(DatabaseError::UnknownTable(_))
        ));
        let bad = EntityRecord::from_payload(json!({ "colour": "red" })).unwrap();
        assert!(store.insert("directus_bookmarks", &bad).await.is_err());
        assert!(store
            .delete("directus_bookmarks", &json!({ "colour": "red" }))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn add_column_backfills_existing_rows() {
        let store = seeded().await;
        let column = ColumnDefinition::new("pinned")
            .set_type(StorageType::Boolean)
            .set_default("false");
        store
            .apply_schema(&SchemaChange::AddColumn { table: "directus_bookmarks".into(), column: column.clone() })
            .await
            .unwrap();
        let rows = store
            .select("directus_bookmarks", FilterData { where_clause: Some(json!({ "pinned": false })), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(rows.len(), 4);

        let dup = store
            .apply_schema(&SchemaChange::AddColumn { table: "directus_bookmarks".into(), column })
            .await;
        assert!(matches!(dup, Err(DatabaseError::Ddl(DdlError::DuplicateColumn { .. }))));
    }
}
