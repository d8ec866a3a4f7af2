use thiserror::Error;

use crate::database::{DatabaseError, RecordError};
use crate::types::Operation;

/// Failure kinds surfaced by every gateway operation
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Absent, or excluded by the row scope. The two are deliberately indistinguishable.
    #[error("Record not found in '{table}'")]
    NotFound { table: String },

    #[error("Permission denied for {operation} on '{table}': {reason}")]
    PermissionDenied {
        table: String,
        operation: Operation,
        reason: String,
    },

    #[error(transparent)]
    Validation(#[from] RecordError),

    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

impl GatewayError {
    pub fn not_found(table: &str) -> Self {
        GatewayError::NotFound { table: table.to_string() }
    }

    pub fn denied(table: &str, operation: Operation, reason: impl Into<String>) -> Self {
        GatewayError::PermissionDenied {
            table: table.to_string(),
            operation,
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound { .. })
    }
}
