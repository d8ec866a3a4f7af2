//! Assembles whole DDL statements around rendered column clauses.

use std::collections::HashSet;

use super::column::ColumnDefinition;
use super::error::DdlError;
use super::Dialect;

/// A structural change to one table
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaChange {
    CreateTable {
        table: String,
        columns: Vec<ColumnDefinition>,
    },
    AddColumn {
        table: String,
        column: ColumnDefinition,
    },
    DropColumn {
        table: String,
        column: String,
    },
}

impl SchemaChange {
    pub fn table(&self) -> &str {
        match self {
            SchemaChange::CreateTable { table, .. }
            | SchemaChange::AddColumn { table, .. }
            | SchemaChange::DropColumn { table, .. } => table,
        }
    }

    pub fn to_sql(&self, dialect: Dialect) -> Result<String, DdlError> {
        match self {
            SchemaChange::CreateTable { table, columns } => create_table(table, columns, dialect),
            SchemaChange::AddColumn { table, column } => add_column(table, column, dialect),
            SchemaChange::DropColumn { table, column } => drop_column(table, column, dialect),
        }
    }
}

/// `CREATE TABLE IF NOT EXISTS` with an auto-assigned `id` primary key
pub fn create_table(
    table: &str,
    columns: &[ColumnDefinition],
    dialect: Dialect,
) -> Result<String, DdlError> {
    let table_sql = dialect.quote_identifier(table)?;

    let mut seen = HashSet::new();
    seen.insert("id");
    let mut clauses = vec![match dialect {
        Dialect::Postgres => "\"id\" BIGSERIAL PRIMARY KEY".to_string(),
        Dialect::MySql => "`id` BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY".to_string(),
    }];

    for column in columns {
        if !seen.insert(column.name()) {
            return Err(DdlError::DuplicateColumn {
                table: table.to_string(),
                column: column.name().to_string(),
            });
        }
        clauses.push(column.to_sql(dialect)?);
    }

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        table_sql,
        clauses.join(", ")
    ))
}

pub fn add_column(
    table: &str,
    column: &ColumnDefinition,
    dialect: Dialect,
) -> Result<String, DdlError> {
    Ok(format!(
        "ALTER TABLE {} ADD COLUMN {}",
        dialect.quote_identifier(table)?,
        column.to_sql(dialect)?
    ))
}

pub fn drop_column(table: &str, column: &str, dialect: Dialect) -> Result<String, DdlError> {
    Ok(format!(
        "ALTER TABLE {} DROP COLUMN {}",
        dialect.quote_identifier(table)?,
        dialect.quote_identifier(column)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::StorageType;

    fn title() -> ColumnDefinition {
        ColumnDefinition::new("title")
            .set_type(StorageType::Varchar)
            .set_length(255_i64)
            .unwrap()
            .set_nullable(false)
    }

    #[test]
    fn create_table_prepends_primary_key() {
        let sql = create_table("notes", &[title()], Dialect::Postgres).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"notes\" (\"id\" BIGSERIAL PRIMARY KEY, \"title\" VARCHAR(255) NOT NULL)"
        );
    }

    #[test]
    fn create_table_rejects_duplicate_columns() {
        let err = create_table("notes", &[title(), title()], Dialect::Postgres).unwrap_err();
        assert!(matches!(err, DdlError::DuplicateColumn { .. }));

        let id = ColumnDefinition::new("id").set_type(StorageType::Integer);
        assert!(create_table("notes", &[id], Dialect::MySql).is_err());
    }

    #[test]
    fn alter_statements() {
        let change = SchemaChange::AddColumn { table: "notes".into(), column: title() };
        assert_eq!(
            change.to_sql(Dialect::MySql).unwrap(),
            "ALTER TABLE `notes` ADD COLUMN `title` VARCHAR(255) NOT NULL"
        );

        let change = SchemaChange::DropColumn { table: "notes".into(), column: "title".into() };
        assert_eq!(change.table(), "notes");
        assert_eq!(
            change.to_sql(Dialect::Postgres).unwrap(),
            "ALTER TABLE \"notes\" DROP COLUMN \"title\""
        );
    }

    #[test]
    fn rejects_unsafe_table_names() {
        assert!(create_table("notes; DROP", &[], Dialect::Postgres).is_err());
        assert!(add_column("", &title(), Dialect::Postgres).is_err());
    }
}
