//! Column definition builder for table creation and alteration.
//!
//! A `ColumnDefinition` carries a storage type plus either a numeric
//! length/precision or, for enumerated columns, the rendered value list.
//! The list is stored in the textual form enumerated declarations expect:
//! each value backslash-escaped, wrapped in double quotes, comma joined.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::error::DdlError;
use super::Dialect;

/// Storage types a column may be declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Integer,
    BigInteger,
    Decimal,
    Float,
    Varchar,
    Char,
    Text,
    Boolean,
    Date,
    DateTime,
    Time,
    Json,
    Enum,
}

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Integer => "integer",
            StorageType::BigInteger => "bigint",
            StorageType::Decimal => "decimal",
            StorageType::Float => "float",
            StorageType::Varchar => "varchar",
            StorageType::Char => "char",
            StorageType::Text => "text",
            StorageType::Boolean => "boolean",
            StorageType::Date => "date",
            StorageType::DateTime => "datetime",
            StorageType::Time => "time",
            StorageType::Json => "json",
            StorageType::Enum => "enum",
        }
    }

    /// Postgres type a bound parameter is cast to for this column
    pub fn postgres_cast(&self) -> &'static str {
        match self {
            StorageType::Integer => "integer",
            StorageType::BigInteger => "bigint",
            StorageType::Decimal => "numeric",
            StorageType::Float => "double precision",
            StorageType::Varchar | StorageType::Char | StorageType::Text | StorageType::Enum => "text",
            StorageType::Boolean => "boolean",
            StorageType::Date => "date",
            StorageType::DateTime => "timestamptz",
            StorageType::Time => "time",
            StorageType::Json => "jsonb",
        }
    }

    /// Types whose values travel as JSON strings
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            StorageType::Varchar
                | StorageType::Char
                | StorageType::Text
                | StorageType::Date
                | StorageType::DateTime
                | StorageType::Time
                | StorageType::Enum
        )
    }
}

impl FromStr for StorageType {
    type Err = DdlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => StorageType::Integer,
            "bigint" | "biginteger" => StorageType::BigInteger,
            "decimal" | "numeric" => StorageType::Decimal,
            "float" | "double" => StorageType::Float,
            "varchar" | "string" => StorageType::Varchar,
            "char" => StorageType::Char,
            "text" => StorageType::Text,
            "bool" | "boolean" => StorageType::Boolean,
            "date" => StorageType::Date,
            "datetime" | "timestamp" => StorageType::DateTime,
            "time" => StorageType::Time,
            "json" => StorageType::Json,
            "enum" => StorageType::Enum,
            other => return Err(DdlError::UnknownType(other.to_string())),
        })
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw input accepted by `ColumnDefinition::set_length`
#[derive(Debug, Clone, PartialEq)]
pub enum LengthValue {
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl From<i64> for LengthValue {
    fn from(v: i64) -> Self {
        LengthValue::Integer(v)
    }
}

impl From<u32> for LengthValue {
    fn from(v: u32) -> Self {
        LengthValue::Integer(v as i64)
    }
}

impl From<f64> for LengthValue {
    fn from(v: f64) -> Self {
        LengthValue::Float(v)
    }
}

impl From<&str> for LengthValue {
    fn from(v: &str) -> Self {
        LengthValue::Text(v.to_string())
    }
}

impl From<String> for LengthValue {
    fn from(v: String) -> Self {
        LengthValue::Text(v)
    }
}

impl From<Vec<String>> for LengthValue {
    fn from(v: Vec<String>) -> Self {
        LengthValue::List(v)
    }
}

impl From<Vec<&str>> for LengthValue {
    fn from(v: Vec<&str>) -> Self {
        LengthValue::List(v.into_iter().map(str::to_string).collect())
    }
}

impl TryFrom<&Value> for LengthValue {
    type Error = DdlError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(LengthValue::Integer(i)),
                None => n
                    .as_f64()
                    .map(LengthValue::Float)
                    .ok_or_else(|| DdlError::InvalidLength(n.to_string())),
            },
            Value::String(s) => Ok(LengthValue::Text(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| DdlError::InvalidLength(format!("enumeration entries must be strings, got {}", item)))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(LengthValue::List),
            other => Err(DdlError::InvalidLength(other.to_string())),
        }
    }
}

/// Stored length: a precision, or the rendered enumeration list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ColumnLength {
    Precision(u32),
    Values(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDefinition {
    name: String,
    #[serde(rename = "type")]
    storage_type: Option<StorageType>,
    length: Option<ColumnLength>,
    scale: Option<u32>,
    nullable: bool,
    default: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storage_type: None,
            length: None,
            scale: None,
            nullable: true,
            default: None,
        }
    }

    /// Record the storage type. Compatibility with the length is checked at render time.
    pub fn set_type(mut self, storage_type: StorageType) -> Self {
        self.storage_type = Some(storage_type);
        self
    }

    /// Record the length/precision, or the enumerated value list.
    ///
    /// Scalars are parsed numerically and truncated toward zero (`"42.9"` becomes 42).
    /// Lists are escaped, double quoted and comma joined into a single string.
    pub fn set_length(mut self, value: impl Into<LengthValue>) -> Result<Self, DdlError> {
        let length = match value.into() {
            LengthValue::List(values) => {
                if values.is_empty() {
                    return Err(DdlError::EmptyEnumeration(self.name.clone()));
                }
                ColumnLength::Values(render_length_list(&values))
            }
            LengthValue::Integer(i) => ColumnLength::Precision(coerce_integer(i)?),
            LengthValue::Float(f) => ColumnLength::Precision(coerce_float(f, &f.to_string())?),
            LengthValue::Text(raw) => {
                let parsed: f64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| DdlError::InvalidLength(raw.clone()))?;
                ColumnLength::Precision(coerce_float(parsed, &raw)?)
            }
        };
        self.length = Some(length);
        Ok(self)
    }

    /// Digits after the decimal point for decimal columns
    pub fn set_scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn set_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn set_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage_type(&self) -> Option<StorageType> {
        self.storage_type
    }

    pub fn length(&self) -> Option<&ColumnLength> {
        self.length.as_ref()
    }

    pub fn precision(&self) -> Option<u32> {
        match self.length {
            Some(ColumnLength::Precision(p)) => Some(p),
            _ => None,
        }
    }

    pub fn scale(&self) -> Option<u32> {
        self.scale
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// A value must be supplied on insert when the column is NOT NULL without a default
    pub fn is_required(&self) -> bool {
        !self.nullable && self.default.is_none()
    }

    /// Values of an enumerated column, recovered from the rendered list
    pub fn enum_values(&self) -> Result<Vec<String>, DdlError> {
        match &self.length {
            Some(ColumnLength::Values(rendered)) => parse_length_list(rendered),
            _ => Err(DdlError::EmptyEnumeration(self.name.clone())),
        }
    }

    /// Render the column clause for a CREATE/ALTER TABLE statement
    pub fn to_sql(&self, dialect: Dialect) -> Result<String, DdlError> {
        let storage_type = self
            .storage_type
            .ok_or_else(|| DdlError::MissingType(self.name.clone()))?;
        let column = dialect.quote_identifier(&self.name)?;

        let type_sql = match dialect {
            Dialect::Postgres => self.postgres_type(storage_type)?,
            Dialect::MySql => self.mysql_type(storage_type)?,
        };

        let mut sql = format!("{} {}", column, type_sql);
        if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            sql.push_str(&format!(" DEFAULT {}", dialect.quote_literal(default)));
        }
        if storage_type == StorageType::Enum && dialect == Dialect::Postgres {
            let values = self.enum_values()?;
            if values.is_empty() {
                return Err(DdlError::EmptyEnumeration(self.name.clone()));
            }
            let quoted = values
                .iter()
                .map(|v| dialect.quote_literal(v))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" CHECK ({} IN ({}))", column, quoted));
        }
        Ok(sql)
    }

    fn postgres_type(&self, storage_type: StorageType) -> Result<String, DdlError> {
        Ok(match storage_type {
            StorageType::Integer => "INTEGER".to_string(),
            StorageType::BigInteger => "BIGINT".to_string(),
            StorageType::Decimal => match (self.precision(), self.scale) {
                (Some(p), Some(s)) => format!("NUMERIC({},{})", p, s),
                (Some(p), None) => format!("NUMERIC({})", p),
                _ => "NUMERIC".to_string(),
            },
            StorageType::Float => "DOUBLE PRECISION".to_string(),
            StorageType::Varchar => self.sized("VARCHAR")?,
            StorageType::Char => self.sized("CHAR")?,
            StorageType::Text => "TEXT".to_string(),
            StorageType::Boolean => "BOOLEAN".to_string(),
            StorageType::Date => "DATE".to_string(),
            StorageType::DateTime => "TIMESTAMPTZ".to_string(),
            StorageType::Time => "TIME".to_string(),
            StorageType::Json => "JSONB".to_string(),
            StorageType::Enum => "TEXT".to_string(),
        })
    }

    fn mysql_type(&self, storage_type: StorageType) -> Result<String, DdlError> {
        Ok(match storage_type {
            StorageType::Integer => self.sized("INT")?,
            StorageType::BigInteger => self.sized("BIGINT")?,
            StorageType::Decimal => match (self.precision(), self.scale) {
                (Some(p), Some(s)) => format!("DECIMAL({},{})", p, s),
                (Some(p), None) => format!("DECIMAL({})", p),
                _ => "DECIMAL".to_string(),
            },
            StorageType::Float => "DOUBLE".to_string(),
            StorageType::Varchar => format!("VARCHAR({})", self.precision().unwrap_or(255)),
            StorageType::Char => self.sized("CHAR")?,
            StorageType::Text => "TEXT".to_string(),
            StorageType::Boolean => "TINYINT(1)".to_string(),
            StorageType::Date => "DATE".to_string(),
            StorageType::DateTime => "DATETIME".to_string(),
            StorageType::Time => "TIME".to_string(),
            StorageType::Json => "JSON".to_string(),
            StorageType::Enum => match &self.length {
                Some(ColumnLength::Values(rendered)) => format!("ENUM({})", rendered),
                _ => return Err(DdlError::EmptyEnumeration(self.name.clone())),
            },
        })
    }

    fn sized(&self, keyword: &str) -> Result<String, DdlError> {
        match &self.length {
            None => Ok(keyword.to_string()),
            Some(ColumnLength::Precision(p)) => Ok(format!("{}({})", keyword, p)),
            Some(ColumnLength::Values(v)) => Err(DdlError::InvalidLength(format!(
                "{} column '{}' cannot take an enumeration ({})",
                keyword, self.name, v
            ))),
        }
    }
}

fn coerce_integer(value: i64) -> Result<u32, DdlError> {
    if value < 0 {
        return Err(DdlError::NegativeLength(value.to_string()));
    }
    u32::try_from(value).map_err(|_| DdlError::InvalidLength(value.to_string()))
}

fn coerce_float(value: f64, raw: &str) -> Result<u32, DdlError> {
    if !value.is_finite() {
        return Err(DdlError::InvalidLength(raw.to_string()));
    }
    let truncated = value.trunc();
    if truncated < 0.0 {
        return Err(DdlError::NegativeLength(raw.to_string()));
    }
    if truncated > u32::MAX as f64 {
        return Err(DdlError::InvalidLength(raw.to_string()));
    }
    Ok(truncated as u32)
}

/// Backslash-escape characters that carry meaning inside a quoted value
pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' | '"' | '\'' => {
                out.push('\\');
                out.push(c);
            }
            '\0' => out.push_str("\\0"),
            _ => out.push(c),
        }
    }
    out
}

/// `["a", "b\"c"]` renders as `"a","b\"c"`
pub fn render_length_list<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|v| format!("\"{}\"", escape_value(v.as_ref())))
        .collect::<Vec<_>>()
        .join(",")
}

/// Inverse of `render_length_list`
pub fn parse_length_list(rendered: &str) -> Result<Vec<String>, DdlError> {
    let mut values = Vec::new();
    let mut chars = rendered.chars().peekable();

    if chars.peek().is_none() {
        return Ok(values);
    }

    loop {
        match chars.next() {
            Some('"') => {}
            _ => return Err(DdlError::MalformedList(rendered.to_string())),
        }

        let mut current = String::new();
        loop {
            match chars.next() {
                Some('\\') => match chars.next() {
                    Some('0') => current.push('\0'),
                    Some(c) => current.push(c),
                    None => return Err(DdlError::MalformedList(rendered.to_string())),
                },
                Some('"') => break,
                Some(c) => current.push(c),
                None => return Err(DdlError::MalformedList(rendered.to_string())),
            }
        }
        values.push(current);

        match chars.next() {
            Some(',') => continue,
            None => return Ok(values),
            Some(_) => return Err(DdlError::MalformedList(rendered.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_lengths_truncate_toward_zero() {
        let col = ColumnDefinition::new("title").set_length("42").unwrap();
        assert_eq!(col.length(), Some(&ColumnLength::Precision(42)));

        let col = ColumnDefinition::new("title").set_length("42.9").unwrap();
        assert_eq!(col.precision(), Some(42));

        let col = ColumnDefinition::new("title").set_length(42.9_f64).unwrap();
        assert_eq!(col.precision(), Some(42));

        let col = ColumnDefinition::new("title").set_length(" 7 ").unwrap();
        assert_eq!(col.precision(), Some(7));
    }

    #[test]
    fn rejects_negative_and_non_numeric_lengths() {
        assert!(matches!(
            ColumnDefinition::new("c").set_length(-3_i64),
            Err(DdlError::NegativeLength(_))
        ));
        assert!(matches!(
            ColumnDefinition::new("c").set_length("-12.5"),
            Err(DdlError::NegativeLength(_))
        ));
        assert!(matches!(
            ColumnDefinition::new("c").set_length("wide"),
            Err(DdlError::InvalidLength(_))
        ));
        // truncation of a small negative fraction lands on zero
        assert_eq!(ColumnDefinition::new("c").set_length("-0.5").unwrap().precision(), Some(0));
    }

    #[test]
    fn defaults_cannot_break_out_of_the_literal() {
        let col = ColumnDefinition::new("note")
            .set_type(StorageType::Varchar)
            .set_length(64_i64)
            .unwrap()
            .set_default("x\\' , evil -- ");

        let mysql = col.to_sql(Dialect::MySql).unwrap();
        assert_eq!(mysql, r"`note` VARCHAR(64) DEFAULT 'x\\\' , evil -- '");

        let postgres = col.to_sql(Dialect::Postgres).unwrap();
        assert_eq!(postgres, r#""note" VARCHAR(64) DEFAULT 'x\'' , evil -- '"#);
    }

    #[test]
    fn enumerated_lengths_are_escaped_and_joined() {
        let col = ColumnDefinition::new("section")
            .set_type(StorageType::Enum)
            .set_length(vec!["a", "b\"c"])
            .unwrap();
        assert_eq!(col.length(), Some(&ColumnLength::Values(r#""a","b\"c""#.to_string())));
    }

    #[test]
    fn enumeration_round_trips_through_parser() {
        let original = vec![
            "plain".to_string(),
            "it's".to_string(),
            "say \"hi\"".to_string(),
            "back\\slash".to_string(),
            "comma,inside".to_string(),
            "nul\0byte".to_string(),
        ];
        let rendered = render_length_list(&original);
        assert_eq!(parse_length_list(&rendered).unwrap(), original);

        let col = ColumnDefinition::new("c").set_length(original.clone()).unwrap();
        assert_eq!(col.enum_values().unwrap(), original);
    }

    #[test]
    fn empty_enumeration_is_rejected() {
        let err = ColumnDefinition::new("section")
            .set_length(Vec::<String>::new())
            .unwrap_err();
        assert_eq!(err, DdlError::EmptyEnumeration("section".to_string()));
    }

    #[test]
    fn malformed_lists_fail_to_parse() {
        assert!(parse_length_list("a,b").is_err());
        assert!(parse_length_list("\"a\"\"b\"").is_err());
        assert!(parse_length_list("\"unterminated").is_err());
        assert_eq!(parse_length_list("").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn length_from_json_values() {
        assert_eq!(LengthValue::try_from(&serde_json::json!(10)).unwrap(), LengthValue::Integer(10));
        assert_eq!(
            LengthValue::try_from(&serde_json::json!(["x", "y"])).unwrap(),
            LengthValue::List(vec!["x".into(), "y".into()])
        );
        assert!(LengthValue::try_from(&serde_json::json!([1, 2])).is_err());
        assert!(LengthValue::try_from(&serde_json::json!({"n": 1})).is_err());
    }

    #[test]
    fn renders_postgres_columns() {
        let col = ColumnDefinition::new("title")
            .set_type(StorageType::Varchar)
            .set_length(255_i64)
            .unwrap()
            .set_nullable(false);
        assert_eq!(col.to_sql(Dialect::Postgres).unwrap(), "\"title\" VARCHAR(255) NOT NULL");

        let col = ColumnDefinition::new("price")
            .set_type(StorageType::Decimal)
            .set_length(10_i64)
            .unwrap()
            .set_scale(2)
            .set_default("0");
        assert_eq!(col.to_sql(Dialect::Postgres).unwrap(), "\"price\" NUMERIC(10,2) DEFAULT '0'");
    }

    #[test]
    fn renders_enumerations_per_dialect() {
        let col = ColumnDefinition::new("sort_order")
            .set_type(StorageType::Enum)
            .set_length(vec!["ASC", "it's"])
            .unwrap();
        assert_eq!(
            col.to_sql(Dialect::MySql).unwrap(),
            r#"`sort_order` ENUM("ASC","it\'s")"#
        );
        assert_eq!(
            col.to_sql(Dialect::Postgres).unwrap(),
            "\"sort_order\" TEXT CHECK (\"sort_order\" IN ('ASC', 'it''s'))"
        );
    }

    #[test]
    fn render_requires_type_and_safe_name() {
        assert!(matches!(
            ColumnDefinition::new("c").to_sql(Dialect::Postgres),
            Err(DdlError::MissingType(_))
        ));
        assert!(matches!(
            ColumnDefinition::new("c\"; DROP TABLE x; --")
                .set_type(StorageType::Text)
                .to_sql(Dialect::Postgres),
            Err(DdlError::InvalidIdentifier(_))
        ));
        assert!(ColumnDefinition::new("c")
            .set_type(StorageType::Enum)
            .to_sql(Dialect::MySql)
            .is_err());
    }

    #[test]
    fn parses_storage_types() {
        assert_eq!("VARCHAR".parse::<StorageType>().unwrap(), StorageType::Varchar);
        assert_eq!("timestamp".parse::<StorageType>().unwrap(), StorageType::DateTime);
        assert!("blob".parse::<StorageType>().is_err());
    }
}
