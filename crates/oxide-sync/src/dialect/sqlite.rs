//! SQLite dialect.
//!
//! Requires SQLite 3.35.0+ (`ALTER TABLE ... DROP COLUMN`) and the JSON1
//! functions, both available in the sqlx bundled library.

use crate::operations::{ColumnSpec, TableOperation, ValueConversion};

use super::SyncDialect;

/// SQLite sync dialect.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn column_definition(&self, column: &ColumnSpec) -> String {
        format!(
            "{} {}",
            self.quote_identifier(&column.name),
            column.definition
        )
    }

    fn create_table_sql(&self, name: &str, columns: &[ColumnSpec]) -> String {
        let col_defs: Vec<String> = columns.iter().map(|c| self.column_definition(c)).collect();
        format!(
            "CREATE TABLE {} (\n  {}\n)",
            self.quote_identifier(name),
            col_defs.join(",\n  ")
        )
    }

    fn rename_table_sql(&self, old_name: &str, new_name: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(old_name),
            self.quote_identifier(new_name)
        )
    }

    fn add_column_sql(&self, table: &str, column: &ColumnSpec) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column)
        )
    }

    fn drop_column_sql(&self, table: &str, column_name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(column_name)
        )
    }

    fn rename_column_sql(&self, table: &str, old_name: &str, new_name: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.quote_identifier(table),
            self.quote_identifier(old_name),
            self.quote_identifier(new_name)
        )
    }

    /// Generates the `UPDATE` copying converted values of `source` into `target`.
    ///
    /// `json_type` is only evaluated for valid JSON, it raises an error otherwise.
    fn convert_values_sql(
        &self,
        table: &str,
        source: &str,
        target: &str,
        conversion: ValueConversion,
    ) -> String {
        let src = self.quote_identifier(source);
        let is_array =
            format!("(CASE WHEN json_valid({src}) THEN json_type({src}) ELSE '' END) = 'array'");

        let value = match conversion {
            ValueConversion::SingleToMultiple => format!(
                "CASE \
                 WHEN COALESCE({src}, '') = '' THEN '[]' \
                 WHEN {is_array} THEN {src} \
                 ELSE json_array({src}) \
                 END"
            ),
            ValueConversion::MultipleToSingle => format!(
                "CASE \
                 WHEN COALESCE({src}, '[]') = '[]' THEN '' \
                 WHEN {is_array} THEN COALESCE(json_extract({src}, '$[#-1]'), '') \
                 ELSE {src} \
                 END"
            ),
        };

        format!(
            "UPDATE {} SET {} = ({value})",
            self.quote_identifier(table),
            self.quote_identifier(target)
        )
    }

    fn drop_index_sql(&self, name: &str, if_exists: bool) -> String {
        let mut sql = String::from("DROP INDEX ");
        if if_exists {
            sql.push_str("IF EXISTS ");
        }
        sql.push_str(&self.quote_identifier(name));
        sql
    }
}

impl SyncDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn generate_sql(&self, operation: &TableOperation) -> Vec<String> {
        match operation {
            TableOperation::CreateTable { name, columns } => {
                vec![self.create_table_sql(name, columns)]
            }

            TableOperation::RenameTable { old_name, new_name } => {
                vec![self.rename_table_sql(old_name, new_name)]
            }

            TableOperation::AddColumn { table, column } => {
                vec![self.add_column_sql(table, column)]
            }

            TableOperation::DropColumn { table, column_name } => {
                vec![self.drop_column_sql(table, column_name)]
            }

            TableOperation::RenameColumn {
                table,
                old_name,
                new_name,
            } => vec![self.rename_column_sql(table, old_name, new_name)],

            TableOperation::ConvertValues {
                table,
                source,
                target,
                conversion,
            } => vec![self.convert_values_sql(table, source, target, *conversion)],

            TableOperation::CreateIndex { index, .. } => vec![index.build()],

            TableOperation::DropIndex { name, if_exists } => {
                vec![self.drop_index_sql(name, *if_exists)]
            }
        }
    }
}
