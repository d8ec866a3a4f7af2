use serde_json::Value;

use super::error::FilterError;
use super::types::{ColumnCasts, FilterOp, FilterWhereInfo};
use crate::ddl::validate_identifier;

/// Compiles the where language into a parameterised SQL predicate.
/// Placeholders continue from `starting_param_index`, so the predicate can
/// follow SET values in an UPDATE. Comparison placeholders carry the
/// column's cast when one is known; LIKE patterns always bind as text.
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
    casts: ColumnCasts,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self::with_casts(starting_param_index, ColumnCasts::default())
    }

    pub fn with_casts(starting_param_index: usize, casts: ColumnCasts) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
            casts,
        }
    }

    pub fn generate(where_data: &Value, starting_param_index: usize) -> Result<(String, Vec<Value>), FilterError> {
        Self::generate_typed(where_data, starting_param_index, &ColumnCasts::default())
    }

    pub fn generate_typed(
        where_data: &Value,
        starting_param_index: usize,
        casts: &ColumnCasts,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::with_casts(starting_param_index, casts.clone());
        let sql = filter_where.build_group(where_data)?;
        Ok((sql, filter_where.param_values))
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null => Ok(()),
            Value::Object(_) => Self::generate(where_data, 0).map(|_| ()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn build_group(&mut self, where_data: &Value) -> Result<String, FilterError> {
        let obj = where_data
            .as_object()
            .ok_or_else(|| FilterError::InvalidWhereClause("Unsupported WHERE format".to_string()))?;

        let mut sql_conditions = vec![];
        for (key, value) in obj {
            if key.starts_with('$') {
                sql_conditions.push(self.build_logical(key, value)?);
            } else {
                for condition in Self::parse_field_condition(key, value)? {
                    sql_conditions.push(self.build_sql_condition(&condition)?);
                }
            }
        }

        Ok(if sql_conditions.is_empty() { "1=1".to_string() } else { sql_conditions.join(" AND ") })
    }

    fn build_logical(&mut self, op: &str, value: &Value) -> Result<String, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value.as_array().ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                if arr.is_empty() {
                    return Ok(if op == "$and" { "1=1" } else { "1=0" }.to_string());
                }
                let mut sql_parts = Vec::with_capacity(arr.len());
                for v in arr {
                    sql_parts.push(format!("({})", self.build_group(v)?));
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                Ok(format!("({})", sql_parts.join(joiner)))
            }
            "$not" => Ok(format!("NOT ({})", self.build_group(value)?)),
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    /// `{ field: value }` is implicit equality; `{ field: { "$op": data } }` names operators
    pub fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<FilterWhereInfo>, FilterError> {
        validate_identifier(field).map_err(|_| FilterError::InvalidColumn(field.to_string()))?;

        match value {
            Value::Object(obj) if obj.keys().all(|k| k.starts_with('$')) && !obj.is_empty() => obj
                .iter()
                .map(|(op_key, op_val)| {
                    Ok(FilterWhereInfo {
                        column: field.to_string(),
                        operator: Self::map_operator(op_key)?,
                        data: op_val.clone(),
                    })
                })
                .collect(),
            _ => Ok(vec![FilterWhereInfo {
                column: field.to_string(),
                operator: FilterOp::Eq,
                data: value.clone(),
            }]),
        }
    }

    pub fn map_operator(op_key: &str) -> Result<FilterOp, FilterError> {
        Ok(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Neq,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$like" => FilterOp::Like,
            "$nlike" => FilterOp::NLike,
            "$ilike" => FilterOp::ILike,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NIn,
            "$between" => FilterOp::Between,
            "$null" => FilterOp::Null,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        let quoted_column = format!("\"{}\"", condition.column);
        let column = condition.column.as_str();
        let data = &condition.data;
        match condition.operator {
            FilterOp::Eq => {
                if data.is_null() { Ok(format!("{} IS NULL", quoted_column)) }
                else { Ok(format!("{} = {}", quoted_column, self.param(column, data))) }
            }
            FilterOp::Neq => {
                if data.is_null() { Ok(format!("{} IS NOT NULL", quoted_column)) }
                else { Ok(format!("{} <> {}", quoted_column, self.param(column, data))) }
            }
            FilterOp::Gt => Ok(format!("{} > {}", quoted_column, self.param(column, data))),
            FilterOp::Gte => Ok(format!("{} >= {}", quoted_column, self.param(column, data))),
            FilterOp::Lt => Ok(format!("{} < {}", quoted_column, self.param(column, data))),
            FilterOp::Lte => Ok(format!("{} <= {}", quoted_column, self.param(column, data))),
            FilterOp::Like => Ok(format!("{} LIKE {}", quoted_column, self.pattern(data))),
            FilterOp::NLike => Ok(format!("{} NOT LIKE {}", quoted_column, self.pattern(data))),
            FilterOp::ILike => Ok(format!("{} ILIKE {}", quoted_column, self.pattern(data))),
            FilterOp::In | FilterOp::NIn => {
                let negate = condition.operator == FilterOp::NIn;
                match data {
                    Value::Array(values) if values.is_empty() => {
                        Ok(if negate { "1=1" } else { "1=0" }.to_string())
                    }
                    Value::Array(values) => {
                        let params: Vec<String> = values.iter().map(|v| self.param(column, v)).collect();
                        let keyword = if negate { "NOT IN" } else { "IN" };
                        Ok(format!("{} {} ({})", quoted_column, keyword, params.join(", ")))
                    }
                    _ => Err(FilterError::InvalidOperatorData("$in/$nin requires array".to_string())),
                }
            }
            FilterOp::Between => match data {
                Value::Array(values) if values.len() == 2 => Ok(format!(
                    "{} BETWEEN {} AND {}",
                    quoted_column,
                    self.param(column, &values[0]),
                    self.param(column, &values[1])
                )),
                _ => Err(FilterError::InvalidOperatorData("$between requires exactly 2 values".to_string())),
            },
            FilterOp::Null => match data {
                Value::Bool(true) => Ok(format!("{} IS NULL", quoted_column)),
                Value::Bool(false) => Ok(format!("{} IS NOT NULL", quoted_column)),
                _ => Err(FilterError::InvalidOperatorData("$null requires a boolean".to_string())),
            },
        }
    }

    fn param(&mut self, column: &str, value: &Value) -> String {
        self.param_values.push(self.casts.prepare(column, value));
        self.param_index += 1;
        self.casts.placeholder(column, self.param_index)
    }

    fn pattern(&mut self, value: &Value) -> String {
        self.param_values.push(value.clone());
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}
