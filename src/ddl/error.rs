use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DdlError {
    #[error("Unknown storage type: {0}")]
    UnknownType(String),

    #[error("Invalid column length: {0}")]
    InvalidLength(String),

    #[error("Column length cannot be negative: {0}")]
    NegativeLength(String),

    #[error("Enumerated column '{0}' requires at least one value")]
    EmptyEnumeration(String),

    #[error("Malformed enumeration list: {0}")]
    MalformedList(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Column '{0}' has no storage type")]
    MissingType(String),

    #[error("Column '{column}' already exists on table '{table}'")]
    DuplicateColumn { table: String, column: String },
}
