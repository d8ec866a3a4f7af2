pub mod manager;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod schema;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use record::{EntityRecord, RecordError, ValidationMode};
pub use schema::{SchemaCatalog, TableSchema, BOOKMARKS_TABLE, COLUMNS_TABLE, PREFERENCES_TABLE};
pub use store::RowStore;
