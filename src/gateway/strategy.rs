//! Small per-resource behaviours composed into the resource gateways.

use serde_json::{json, Value};

use crate::database::EntityRecord;
use crate::types::RecordId;

/// Writes the acting identity into the owner column, replacing whatever the payload carried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerStamp {
    column: String,
}

impl OwnerStamp {
    pub fn new(column: impl Into<String>) -> Self {
        Self { column: column.into() }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn apply(&self, record: &mut EntityRecord, owner: RecordId) {
        if let Some(previous) = record.get(&self.column) {
            if previous != &Value::from(owner) {
                tracing::debug!("Overwriting supplied owner {} on '{}'", previous, self.column);
            }
        }
        record.set(self.column.clone(), owner);
    }

    /// Condition matching rows owned by `owner`
    pub fn condition(&self, owner: RecordId) -> Value {
        json!({ self.column.as_str(): owner })
    }
}

/// Compound lookup by owner plus one secondary column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryKey {
    owner_column: String,
    key_column: String,
}

impl SecondaryKey {
    pub fn new(owner_column: impl Into<String>, key_column: impl Into<String>) -> Self {
        Self {
            owner_column: owner_column.into(),
            key_column: key_column.into(),
        }
    }

    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    pub fn condition(&self, owner: RecordId, key: impl Into<Value>) -> Value {
        json!({
            "$and": [
                { self.owner_column.as_str(): owner },
                { self.key_column.as_str(): key.into() },
            ]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_stamp_overwrites_forged_owner() {
        let mut record = EntityRecord::from_payload(json!({ "title": "Dash", "user": 99 })).unwrap();
        OwnerStamp::new("user").apply(&mut record, 7);
        assert_eq!(record.get("user"), Some(&json!(7)));
    }

    #[test]
    fn secondary_key_conjoins_owner_and_key() {
        let key = SecondaryKey::new("user", "title");
        assert_eq!(
            key.condition(3, "Dash"),
            json!({ "$and": [{ "user": 3 }, { "title": "Dash" }] })
        );
    }
}
