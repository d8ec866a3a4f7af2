use serde::Serialize;
use serde_json::{Map, Value};

use crate::database::schema::TableSchema;
use crate::ddl::StorageType;
use crate::types::RecordId;

/// Errors raised while shaping or validating a record
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("Expected JSON object")]
    NotAnObject,
    #[error("Unknown field '{field}' for table '{table}'")]
    UnknownField { table: String, field: String },
    #[error("Field '{field}' expects {expected}")]
    TypeMismatch { field: String, expected: String },
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),
    #[error("Field '{field}' exceeds maximum length {max}")]
    ValueTooLong { field: String, max: u32 },
    #[error("Field '{field}' does not accept value '{value}'")]
    InvalidEnumValue { field: String, value: String },
    #[error("Field 'id' is assigned by storage and cannot be supplied")]
    IdNotAllowed,
    #[error("Payload must include a numeric 'id'")]
    MissingId,
}

impl RecordError {
    /// Field the error is about, when there is one
    pub fn field(&self) -> Option<&str> {
        match self {
            RecordError::UnknownField { field, .. }
            | RecordError::TypeMismatch { field, .. }
            | RecordError::ValueTooLong { field, .. }
            | RecordError::InvalidEnumValue { field, .. } => Some(field),
            RecordError::MissingRequiredField(field) => Some(field),
            RecordError::IdNotAllowed | RecordError::MissingId => Some("id"),
            RecordError::NotAnObject => None,
        }
    }
}

/// Which rules apply when validating against a table schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Full row: required columns must be present, `id` must not
    Insert,
    /// Partial row: only the supplied fields are checked
    Update,
}

/// One row of an arbitrary table, keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EntityRecord {
    fields: Map<String, Value>,
}

impl EntityRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record from parsed request payload
    pub fn from_payload(payload: Value) -> Result<Self, RecordError> {
        match payload {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(RecordError::NotAnObject),
        }
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Numeric `id`, if present
    pub fn id(&self) -> Option<RecordId> {
        match self.fields.get("id") {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        }
    }

    /// Remove and return the `id` field
    pub fn take_id(&mut self) -> Result<RecordId, RecordError> {
        let id = self.id().ok_or(RecordError::MissingId)?;
        self.fields.remove("id");
        Ok(id)
    }

    /// Drop the named columns
    pub fn strip(&mut self, columns: &[String]) {
        for column in columns {
            self.fields.remove(column);
        }
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }

    /// Check every field against the table schema, rejecting anything it does not describe
    pub fn validate(&self, schema: &TableSchema, mode: ValidationMode) -> Result<(), RecordError> {
        for (field, value) in &self.fields {
            if field == "id" {
                match mode {
                    ValidationMode::Insert => return Err(RecordError::IdNotAllowed),
                    ValidationMode::Update => continue,
                }
            }

            let column = schema.find_column(field).ok_or_else(|| RecordError::UnknownField {
                table: schema.name.clone(),
                field: field.clone(),
            })?;

            if value.is_null() {
                if !column.is_nullable() {
                    return Err(RecordError::MissingRequiredField(field.clone()));
                }
                continue;
            }

            let Some(storage_type) = column.storage_type() else { continue };
            let mismatch = |expected: &str| RecordError::TypeMismatch {
                field: field.clone(),
                expected: expected.to_string(),
            };

            match storage_type {
                StorageType::Integer | StorageType::BigInteger => {
                    if !(value.is_i64() || value.is_u64()) {
                        return Err(mismatch("an integer"));
                    }
                }
                StorageType::Decimal | StorageType::Float => {
                    if !value.is_number() {
                        return Err(mismatch("a number"));
                    }
                }
                StorageType::Boolean => {
                    if !value.is_boolean() {
                        return Err(mismatch("a boolean"));
                    }
                }
                StorageType::Json => {}
                textual => {
                    let text = value.as_str().ok_or_else(|| mismatch("a string"))?;
                    match textual {
                        StorageType::Varchar | StorageType::Char => {
                            if let Some(max) = column.precision() {
                                if text.chars().count() > max as usize {
                                    return Err(RecordError::ValueTooLong { field: field.clone(), max });
                                }
                            }
                        }
                        StorageType::Enum => {
                            let allowed = column.enum_values().unwrap_or_default();
                            if !allowed.iter().any(|v| v == text) {
                                return Err(RecordError::InvalidEnumValue {
                                    field: field.clone(),
                                    value: text.to_string(),
                                });
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        if mode == ValidationMode::Insert {
            for column in &schema.columns {
                if column.is_required() && !self.fields.contains_key(column.name()) {
                    return Err(RecordError::MissingRequiredField(column.name().to_string()));
                }
            }
        }

        Ok(())
    }
}

impl From<Map<String, Value>> for EntityRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self::from_map(fields)
    }
}

impl From<EntityRecord> for Value {
    fn from(record: EntityRecord) -> Self {
        Value::Object(record.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::{bookmarks_schema, preferences_schema};
    use serde_json::json;

    fn record(value: Value) -> EntityRecord {
        EntityRecord::from_payload(value).unwrap()
    }

    #[test]
    fn rejects_non_objects() {
        assert_eq!(EntityRecord::from_payload(json!([1, 2])), Err(RecordError::NotAnObject));
    }

    #[test]
    fn insert_requires_title_and_rejects_id() {
        let schema = bookmarks_schema().unwrap();
        assert_eq!(
            record(json!({ "user": 1 })).validate(&schema, ValidationMode::Insert),
            Err(RecordError::MissingRequiredField("title".into()))
        );
        assert_eq!(
            record(json!({ "id": 3, "user": 1, "title": "Dash" })).validate(&schema, ValidationMode::Insert),
            Err(RecordError::IdNotAllowed)
        );
        assert!(record(json!({ "user": 1, "title": "Dash" }))
            .validate(&schema, ValidationMode::Insert)
            .is_ok());
    }

    #[test]
    fn update_checks_only_supplied_fields() {
        let schema = bookmarks_schema().unwrap();
        assert!(record(json!({ "id": 3, "url": "/tables/posts" }))
            .validate(&schema, ValidationMode::Update)
            .is_ok());
        assert_eq!(
            record(json!({ "title": null })).validate(&schema, ValidationMode::Update),
            Err(RecordError::MissingRequiredField("title".into()))
        );
    }

    #[test]
    fn rejects_unknown_and_mistyped_fields() {
        let schema = bookmarks_schema().unwrap();
        assert!(matches!(
            record(json!({ "title": "x", "colour": "red" })).validate(&schema, ValidationMode::Update),
            Err(RecordError::UnknownField { .. })
        ));
        assert!(matches!(
            record(json!({ "user": "seven" })).validate(&schema, ValidationMode::Update),
            Err(RecordError::TypeMismatch { .. })
        ));
        assert!(matches!(
            record(json!({ "title": "x".repeat(256) })).validate(&schema, ValidationMode::Update),
            Err(RecordError::ValueTooLong { max: 255, .. })
        ));
    }

    #[test]
    fn enum_columns_accept_only_listed_values() {
        let schema = preferences_schema().unwrap();
        assert!(record(json!({ "sort_order": "DESC" }))
            .validate(&schema, ValidationMode::Update)
            .is_ok());
        let err = record(json!({ "sort_order": "SIDEWAYS" }))
            .validate(&schema, ValidationMode::Update)
            .unwrap_err();
        assert_eq!(err.field(), Some("sort_order"));
    }

    #[test]
    fn take_id_accepts_numeric_strings() {
        let mut r = record(json!({ "id": "12", "title": "x" }));
        assert_eq!(r.take_id(), Ok(12));
        assert!(!r.contains("id"));
        assert_eq!(record(json!({ "title": "x" })).take_id(), Err(RecordError::MissingId));
    }
}
