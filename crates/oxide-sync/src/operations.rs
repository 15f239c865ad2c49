//! Table operations.
//!
//! Every physical change the engine makes to a record table is expressed as a
//! [`TableOperation`]. The planner produces them, a
//! [`SyncDialect`](crate::dialect::SyncDialect) turns them into SQL and the
//! [`StatementExecutor`](crate::executor::StatementExecutor) runs them.

use serde::{Deserialize, Serialize};

use crate::index::IndexDescriptor;

/// A column name together with its opaque SQL definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    /// Type and constraints, e.g. `TEXT DEFAULT '' NOT NULL`.
    pub definition: String,
}

impl ColumnSpec {
    /// Creates a new column spec.
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
        }
    }
}

/// Direction of a value conversion between storage representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueConversion {
    /// Scalar column to JSON array column.
    SingleToMultiple,
    /// JSON array column to scalar column, keeping the last element.
    MultipleToSingle,
}

/// A single physical change to a record table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableOperation {
    /// Create a table.
    CreateTable {
        /// Table name.
        name: String,
        /// Column definitions, in order.
        columns: Vec<ColumnSpec>,
    },

    /// Rename a table.
    RenameTable {
        /// Old table name.
        old_name: String,
        /// New table name.
        new_name: String,
    },

    /// Add a column to a table.
    AddColumn {
        /// Table name.
        table: String,
        /// Column definition.
        column: ColumnSpec,
    },

    /// Drop a column from a table.
    DropColumn {
        /// Table name.
        table: String,
        /// Column name.
        column_name: String,
    },

    /// Rename a column.
    RenameColumn {
        /// Table name.
        table: String,
        /// Old column name.
        old_name: String,
        /// New column name.
        new_name: String,
    },

    /// Fill `target` with the converted values of `source` for every row.
    ConvertValues {
        /// Table name.
        table: String,
        /// Column holding the current values.
        source: String,
        /// Column receiving the converted values.
        target: String,
        /// Conversion rule.
        conversion: ValueConversion,
    },

    /// Create an index.
    CreateIndex {
        /// Position in the collection's index list; `None` for system indexes.
        ///
        /// Failures of positioned indexes are reported as validation errors
        /// instead of aborting the sync.
        position: Option<usize>,
        /// Index definition.
        index: IndexDescriptor,
    },

    /// Drop an index.
    DropIndex {
        /// Index name.
        name: String,
        /// Whether to use IF EXISTS.
        if_exists: bool,
    },
}

impl TableOperation {
    /// Creates a rename table operation.
    pub fn rename_table(old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self::RenameTable {
            old_name: old_name.into(),
            new_name: new_name.into(),
        }
    }

    /// Creates an add column operation.
    pub fn add_column(
        table: impl Into<String>,
        name: impl Into<String>,
        definition: impl Into<String>,
    ) -> Self {
        Self::AddColumn {
            table: table.into(),
            column: ColumnSpec::new(name, definition),
        }
    }

    /// Creates a drop column operation.
    pub fn drop_column(table: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self::DropColumn {
            table: table.into(),
            column_name: column_name.into(),
        }
    }

    /// Creates a rename column operation.
    pub fn rename_column(
        table: impl Into<String>,
        old_name: impl Into<String>,
        new_name: impl Into<String>,
    ) -> Self {
        Self::RenameColumn {
            table: table.into(),
            old_name: old_name.into(),
            new_name: new_name.into(),
        }
    }

    /// Creates an `IF EXISTS` drop index operation.
    pub fn drop_index(name: impl Into<String>) -> Self {
        Self::DropIndex {
            name: name.into(),
            if_exists: true,
        }
    }

    /// Short description used in error messages and logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::CreateTable { name, .. } => format!("create table {name}"),
            Self::RenameTable { old_name, new_name } => {
                format!("rename table {old_name} to {new_name}")
            }
            Self::AddColumn { table, column } => {
                format!("add column {} to {table}", column.name)
            }
            Self::DropColumn { table, column_name } => {
                format!("drop column {column_name} from {table}")
            }
            Self::RenameColumn {
                table,
                old_name,
                new_name,
            } => format!("rename column {old_name} to {new_name} in {table}"),
            Self::ConvertValues {
                table,
                source,
                target,
                ..
            } => format!("convert values of {table}.{source} into {target}"),
            Self::CreateIndex { index, .. } => format!("create index {}", index.index_name),
            Self::DropIndex { name, .. } => format!("drop index {name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        assert_eq!(
            TableOperation::drop_column("posts", "title").describe(),
            "drop column title from posts"
        );
        assert_eq!(
            TableOperation::rename_column("posts", "a", "b").describe(),
            "rename column a to b in posts"
        );
        assert_eq!(
            TableOperation::drop_index("idx").describe(),
            "drop index idx"
        );
    }

    #[test]
    fn test_serialize_operation() {
        let op = TableOperation::add_column("posts", "title", "TEXT DEFAULT '' NOT NULL");
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["AddColumn"]["column"]["name"], "title");

        let back: TableOperation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }
}
