use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{ColumnCasts, FilterData, FilterOrderInfo, SqlResult};
use crate::ddl::validate_identifier;

pub struct Filter {
    table_name: String,
    select_columns: Vec<String>,
    where_data: Option<Value>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i32>,
    offset: Option<i32>,
    casts: ColumnCasts,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        validate_identifier(&table_name).map_err(|_| FilterError::InvalidTableName(table_name.clone()))?;
        Ok(Self {
            table_name,
            select_columns: vec![],
            where_data: None,
            order_data: vec![],
            limit: None,
            offset: None,
            casts: ColumnCasts::default(),
        })
    }

    /// Cast comparison parameters to the column types in `casts`
    pub fn with_casts(&mut self, casts: ColumnCasts) -> &mut Self {
        self.casts = casts;
        self
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(select) = data.select { self.select(select)?; }
        if let Some(where_clause) = data.where_clause { self.where_clause(where_clause)?; }
        if let Some(order) = data.order { self.order(order)?; }
        self.limit(data.limit, data.offset)?;
        Ok(self)
    }

    pub fn select(&mut self, columns: Vec<String>) -> Result<&mut Self, FilterError> {
        for column in &columns {
            if column == "*" { continue; }
            validate_identifier(column).map_err(|_| FilterError::InvalidColumn(column.clone()))?;
        }
        self.select_columns = columns;
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.where_data = if conditions.is_null() { None } else { Some(conditions) };
        Ok(self)
    }

    pub fn order(&mut self, order_spec: Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(&order_spec)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: Option<i32>, offset: Option<i32>) -> Result<&mut Self, FilterError> {
        if let Some(l) = limit.filter(|l| *l < 0) {
            return Err(FilterError::InvalidLimit(l.to_string()));
        }
        if let Some(o) = offset.filter(|o| *o < 0) {
            return Err(FilterError::InvalidOffset(o.to_string()));
        }

        // default applies only when the caller gave no limit; the cap applies to both
        let bounds = &crate::config::CONFIG.filter;
        let cap = bounds.max_limit.unwrap_or(i32::MAX);
        self.limit = limit.or(bounds.default_limit).map(|l| {
            if l > cap && bounds.debug_logging {
                tracing::debug!(table = %self.table_name, "Capping limit {} to {}", l, cap);
            }
            l.min(cap)
        });
        self.offset = offset;
        Ok(self)
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn select_columns(&self) -> &[String] {
        &self.select_columns
    }

    pub fn where_data(&self) -> Option<&Value> {
        self.where_data.as_ref()
    }

    pub fn order_data(&self) -> &[FilterOrderInfo] {
        &self.order_data
    }

    pub fn limit_value(&self) -> Option<i32> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<i32> {
        self.offset
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql(0)?;
        let query = [
            format!("SELECT {}", self.build_select_clause()),
            format!("FROM \"{}\"", self.table_name),
            if where_result.query.is_empty() { String::new() } else { format!("WHERE {}", where_result.query) },
            FilterOrder::generate(&self.order_data),
            self.build_limit_clause(),
        ].into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ");

        Ok(SqlResult { query, params: where_result.params })
    }

    /// Bare predicate with placeholders numbered after `starting_param_index`
    pub fn to_where_sql(&self, starting_param_index: usize) -> Result<SqlResult, FilterError> {
        match &self.where_data {
            Some(where_data) => {
                let (query, params) = FilterWhere::generate_typed(where_data, starting_param_index, &self.casts)?;
                Ok(SqlResult { query, params })
            }
            None => Ok(SqlResult { query: String::new(), params: vec![] }),
        }
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql(0)?;
        let query = if where_result.query.is_empty() {
            format!("SELECT COUNT(*) as count FROM \"{}\"", self.table_name)
        } else {
            format!("SELECT COUNT(*) as count FROM \"{}\" WHERE {}", self.table_name, where_result.query)
        };
        Ok(SqlResult { query, params: where_result.params })
    }

    fn build_select_clause(&self) -> String {
        if self.select_columns.is_empty() || self.select_columns.iter().any(|c| c == "*") {
            "*".to_string()
        } else {
            self.select_columns.iter().map(|c| format!("\"{}\"", c)).collect::<Vec<_>>().join(", ")
        }
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_full_select() {
        let mut filter = Filter::new("directus_bookmarks").unwrap();
        filter
            .assign(FilterData {
                select: Some(vec!["id".into(), "title".into()]),
                where_clause: Some(json!({ "user": 1 })),
                order: Some(json!("id asc")),
                limit: Some(10),
                offset: Some(20),
            })
            .unwrap();
        let sql = filter.to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT \"id\", \"title\" FROM \"directus_bookmarks\" WHERE \"user\" = $1 ORDER BY \"id\" ASC LIMIT 10 OFFSET 20"
        );
        assert_eq!(sql.params, vec![json!(1)]);
    }

    #[test]
    fn limit_is_capped_by_config() {
        let mut filter = Filter::new("t").unwrap();
        filter.limit(Some(i32::MAX), None).unwrap();
        let max = crate::config::CONFIG.filter.max_limit.unwrap_or(i32::MAX);
        assert_eq!(filter.limit_value(), Some(max));
        assert!(filter.limit(Some(-1), None).is_err());
    }

    #[test]
    fn rejects_bad_identifiers() {
        assert!(Filter::new("users; --").is_err());
        let mut filter = Filter::new("t").unwrap();
        assert!(filter.select(vec!["a b".into()]).is_err());
    }

    #[test]
    fn count_sql_reuses_predicate() {
        let mut filter = Filter::new("t").unwrap();
        filter.where_clause(json!({ "title": { "$neq": "x" } })).unwrap();
        let sql = filter.to_count_sql().unwrap();
        assert_eq!(sql.query, "SELECT COUNT(*) as count FROM \"t\" WHERE \"title\" <> $1");
    }
}
