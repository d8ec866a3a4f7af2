use thiserror::Error;

/// Rejections raised while turning caller filters into a query
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Invalid column name: {0}")]
    InvalidColumn(String),

    #[error("Invalid where clause: {0}")]
    InvalidWhereClause(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid operand: {0}")]
    InvalidOperatorData(String),

    #[error("Limit must be non-negative, got {0}")]
    InvalidLimit(String),

    #[error("Offset must be non-negative, got {0}")]
    InvalidOffset(String),

    #[error("Malformed filter: {0}")]
    Malformed(#[from] serde_json::Error),
}
