/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary key of every gateway-managed row
pub type RecordId = i64;

/// The authenticated principal on whose behalf an operation executes.
/// Supplied by the authentication layer and read-only to everything below it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: RecordId,
    #[serde(default)]
    pub admin: bool,
}

impl Identity {
    pub fn user(id: RecordId) -> Self {
        Self { id, admin: false }
    }

    pub fn admin(id: RecordId) -> Self {
        Self { id, admin: true }
    }
}

/// Operation kinds the permission layer decides on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
