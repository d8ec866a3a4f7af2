pub mod schema_service;

pub use schema_service::{ColumnSpec, SchemaError, SchemaService, TableSpec};
