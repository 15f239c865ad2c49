//! Database dialect implementations.
//!
//! A dialect knows how to render [`TableOperation`]s as SQL statements for
//! one database system.

mod sqlite;

pub use sqlite::SqliteDialect;

use crate::operations::TableOperation;

/// Trait for database-specific SQL generation.
pub trait SyncDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Generates SQL for a table operation.
    fn generate_sql(&self, operation: &TableOperation) -> Vec<String>;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        quote_identifier(name)
    }
}

/// Double-quotes an identifier, escaping embedded quotes.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
