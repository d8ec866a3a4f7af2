pub mod column;
pub mod error;
pub mod statement;

pub use column::{ColumnDefinition, ColumnLength, LengthValue, StorageType};
pub use error::DdlError;
pub use statement::SchemaChange;

/// Maximum identifier length accepted by every supported dialect
const MAX_IDENTIFIER_LEN: usize = 63;

/// Target DDL dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
}

impl Dialect {
    /// Validate and quote a table or column name
    pub fn quote_identifier(&self, name: &str) -> Result<String, DdlError> {
        validate_identifier(name)?;
        Ok(match self {
            Dialect::Postgres => format!("\"{}\"", name),
            Dialect::MySql => format!("`{}`", name),
        })
    }

    /// Single-quoted string literal. MySQL treats backslash as an escape, Postgres does not.
    pub fn quote_literal(&self, value: &str) -> String {
        match self {
            Dialect::Postgres => format!("'{}'", value.replace('\'', "''")),
            Dialect::MySql => format!("'{}'", column::escape_value(value)),
        }
    }
}

/// Identifiers must match `[A-Za-z_][A-Za-z0-9_]*`
pub fn validate_identifier(name: &str) -> Result<(), DdlError> {
    let mut chars = name.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    if !valid_start
        || name.len() > MAX_IDENTIFIER_LEN
        || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(DdlError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_identifiers() {
        assert!(validate_identifier("directus_bookmarks").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1table").is_err());
        assert!(validate_identifier("bad-name").is_err());
        assert!(validate_identifier("x\"; DROP TABLE y").is_err());
        assert!(validate_identifier(&"a".repeat(64)).is_err());
    }

    #[test]
    fn quotes_per_dialect() {
        assert_eq!(Dialect::Postgres.quote_identifier("title").unwrap(), "\"title\"");
        assert_eq!(Dialect::MySql.quote_identifier("title").unwrap(), "`title`");
    }
}
