use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "$eq")] Eq,
    #[serde(rename = "$neq")] Neq,
    #[serde(rename = "$gt")] Gt,
    #[serde(rename = "$gte")] Gte,
    #[serde(rename = "$lt")] Lt,
    #[serde(rename = "$lte")] Lte,

    #[serde(rename = "$like")] Like,
    #[serde(rename = "$nlike")] NLike,
    #[serde(rename = "$ilike")] ILike,

    #[serde(rename = "$in")] In,
    #[serde(rename = "$nin")] NIn,

    #[serde(rename = "$between")] Between,
    #[serde(rename = "$null")] Null,
}

/// Caller-supplied read shaping: projection, conditions, ordering, paging
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterData {
    pub select: Option<Vec<String>>,
    #[serde(rename = "where")]
    pub where_clause: Option<Value>,
    pub order: Option<Value>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

impl FilterData {
    /// Conjoin extra conditions with whatever the caller asked for.
    /// The caller's clause can narrow the result but never widen past `conditions`.
    pub fn and_where(mut self, conditions: Value) -> Self {
        self.where_clause = Some(match self.where_clause.take() {
            None | Some(Value::Null) => conditions,
            Some(existing) => json!({ "$and": [existing, conditions] }),
        });
        self
    }

    pub fn with_limit(mut self, limit: i32) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone)]
pub struct FilterWhereInfo {
    pub column: String,
    pub operator: FilterOp,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}


/// Postgres type each column's bound parameters are cast to.
/// Columns without an entry bind untyped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnCasts {
    types: HashMap<String, &'static str>,
}

impl ColumnCasts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, pg_type: &'static str) -> Self {
        self.types.insert(column.into(), pg_type);
        self
    }

    pub fn get(&self, column: &str) -> Option<&'static str> {
        self.types.get(column).copied()
    }

    /// `$n`, or `$n::type` for a typed column
    pub fn placeholder(&self, column: &str, index: usize) -> String {
        match self.get(column) {
            Some(pg_type) => format!("${}::{}", index, pg_type),
            None => format!("${}", index),
        }
    }

    /// Value to bind for `column`; JSON columns receive their serialized text
    pub fn prepare(&self, column: &str, value: &Value) -> Value {
        match self.get(column) {
            Some("jsonb") if !value.is_null() => Value::String(value.to_string()),
            _ => value.clone(),
        }
    }
}
