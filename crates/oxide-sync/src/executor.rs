//! Statement executor.
//!
//! Runs planned [`TableOperation`]s on a connection, usually the one of the
//! sync transaction.

use sqlx::SqliteConnection;
use tracing::{debug, warn};

use crate::dialect::SyncDialect;
use crate::error::{Result, SyncError, ValidationError, ValidationErrors};
use crate::operations::TableOperation;
use crate::plan::PlannedStep;

/// Executes table operations through a dialect.
#[derive(Debug, Clone, Default)]
pub struct StatementExecutor<D: SyncDialect> {
    dialect: D,
}

impl<D: SyncDialect> StatementExecutor<D> {
    /// Creates a new executor.
    pub fn new(dialect: D) -> Self {
        Self { dialect }
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    /// Executes a single operation.
    ///
    /// Statements are executed unprepared; schema statements are never
    /// reused and would only churn the statement cache.
    pub async fn execute(
        &self,
        conn: &mut SqliteConnection,
        operation: &TableOperation,
    ) -> Result<()> {
        for sql in self.dialect.generate_sql(operation) {
            debug!(sql = %sql, "Executing SQL");

            if let Err(source) = sqlx::raw_sql(&sql).execute(&mut *conn).await {
                return Err(SyncError::Statement {
                    operation: operation.describe(),
                    sql,
                    source,
                });
            }
        }
        Ok(())
    }

    /// Executes every operation of a step, in order.
    ///
    /// A failing `CREATE INDEX` for a user index is recorded in `errors`
    /// under the index position and execution moves on. Any other failure
    /// stops the step.
    pub async fn execute_step(
        &self,
        conn: &mut SqliteConnection,
        step: &PlannedStep,
        errors: &mut ValidationErrors,
    ) -> Result<()> {
        for operation in &step.operations {
            let Err(err) = self.execute(conn, operation).await else {
                continue;
            };

            match (operation, err) {
                (
                    TableOperation::CreateIndex {
                        position: Some(position),
                        index,
                    },
                    SyncError::Statement { source, .. },
                ) => {
                    warn!(
                        index = %index.index_name,
                        position = *position,
                        error = %source,
                        "Failed to create index"
                    );
                    errors.add(
                        *position,
                        ValidationError::new(
                            ValidationError::INVALID_INDEX,
                            format!("Failed to create index {} - {source}.", index.index_name),
                        ),
                    );
                }
                (_, err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Generates SQL for an operation without executing it.
    #[must_use]
    pub fn sql_for(&self, operation: &TableOperation) -> Vec<String> {
        self.dialect.generate_sql(operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SqliteDialect;
    use crate::index::IndexDescriptor;
    use crate::operations::{ColumnSpec, ValueConversion};
    use crate::plan::SyncStep;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory SQLite pool")
    }

    fn create_posts() -> TableOperation {
        TableOperation::CreateTable {
            name: "posts".to_string(),
            columns: vec![
                ColumnSpec::new("id", "TEXT PRIMARY KEY NOT NULL"),
                ColumnSpec::new("title", "TEXT DEFAULT '' NOT NULL"),
            ],
        }
    }

    #[tokio::test]
    async fn test_execute_operation() {
        let pool = create_test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let executor = StatementExecutor::new(SqliteDialect::new());

        executor.execute(&mut conn, &create_posts()).await.unwrap();
        executor
            .execute(
                &mut conn,
                &TableOperation::add_column("posts", "views", "NUMERIC DEFAULT 0 NOT NULL"),
            )
            .await
            .unwrap();

        let count: i64 =
            sqlx::query_scalar("SELECT count(*) FROM pragma_table_info('posts')")
                .fetch_one(&mut *conn)
                .await
                .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_statement_error_carries_context() {
        let pool = create_test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let executor = StatementExecutor::new(SqliteDialect::new());

        let err = executor
            .execute(&mut conn, &TableOperation::drop_column("missing", "title"))
            .await
            .unwrap_err();

        match err {
            SyncError::Statement { sql, .. } => {
                assert_eq!(sql, "ALTER TABLE \"missing\" DROP COLUMN \"title\"");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    async fn insert_duplicate_titles(conn: &mut SqliteConnection) {
        sqlx::query("INSERT INTO posts (id, title) VALUES ('a', 'same'), ('b', 'same')")
            .execute(&mut *conn)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_user_index_is_collected() {
        let pool = create_test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let executor = StatementExecutor::new(SqliteDialect::new());
        executor.execute(&mut conn, &create_posts()).await.unwrap();
        insert_duplicate_titles(&mut conn).await;

        let step = PlannedStep::new(
            SyncStep::BuildIndexes,
            vec![
                TableOperation::CreateIndex {
                    position: Some(0),
                    index: IndexDescriptor::new("idx_unique_title", "posts", &["title"]).unique(),
                },
                TableOperation::CreateIndex {
                    position: Some(1),
                    index: IndexDescriptor::new("idx_title", "posts", &["title"]),
                },
            ],
        );
        let mut errors = ValidationErrors::new();
        executor
            .execute_step(&mut conn, &step, &mut errors)
            .await
            .unwrap();

        assert_eq!(errors.positions(), vec![0]);
        let message = &errors.get(0).unwrap().message;
        assert!(message.starts_with("Failed to create index idx_unique_title - "));

        let created: Option<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND name = 'idx_title'",
        )
        .fetch_optional(&mut *conn)
        .await
        .unwrap();
        assert!(created.is_some());
    }

    #[tokio::test]
    async fn test_failed_system_index_is_fatal() {
        let pool = create_test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let executor = StatementExecutor::new(SqliteDialect::new());
        executor.execute(&mut conn, &create_posts()).await.unwrap();
        insert_duplicate_titles(&mut conn).await;

        let step = PlannedStep::new(
            SyncStep::CreateTable,
            vec![TableOperation::CreateIndex {
                position: None,
                index: IndexDescriptor::new("idx_unique_title", "posts", &["title"]).unique(),
            }],
        );
        let mut errors = ValidationErrors::new();
        let result = executor.execute_step(&mut conn, &step, &mut errors).await;

        assert!(matches!(result, Err(SyncError::Statement { .. })));
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_convert_values_on_nullable_columns() {
        let pool = create_test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let executor = StatementExecutor::new(SqliteDialect::new());

        sqlx::raw_sql(
            r#"CREATE TABLE posts (id TEXT, tag TEXT, tag_multi TEXT, tags TEXT, tags_single TEXT);
               INSERT INTO posts (id, tag, tags) VALUES
                 ('a', NULL, NULL),
                 ('b', '', '[]'),
                 ('c', '["x","y"]', '["x","y"]'),
                 ('d', 'plain', 'notjson'),
                 ('e', '5', '[1,2]');"#,
        )
        .execute(&mut *conn)
        .await
        .unwrap();

        for (source, target, conversion) in [
            ("tag", "tag_multi", ValueConversion::SingleToMultiple),
            ("tags", "tags_single", ValueConversion::MultipleToSingle),
        ] {
            let operation = TableOperation::ConvertValues {
                table: "posts".to_string(),
                source: source.to_string(),
                target: target.to_string(),
                conversion,
            };
            executor.execute(&mut conn, &operation).await.unwrap();
        }

        let multi: Vec<String> = sqlx::query_scalar("SELECT tag_multi FROM posts ORDER BY id")
            .fetch_all(&mut *conn)
            .await
            .unwrap();
        assert_eq!(
            multi,
            vec!["[]", "[]", r#"["x","y"]"#, r#"["plain"]"#, r#"["5"]"#]
        );

        let single: Vec<String> = sqlx::query_scalar("SELECT tags_single FROM posts ORDER BY id")
            .fetch_all(&mut *conn)
            .await
            .unwrap();
        assert_eq!(single, vec!["", "", "y", "notjson", "2"]);
    }

    #[test]
    fn test_sql_for() {
        let executor = StatementExecutor::new(SqliteDialect::new());
        let sql = executor.sql_for(&TableOperation::rename_table("posts", "articles"));
        assert_eq!(sql, vec!["ALTER TABLE \"posts\" RENAME TO \"articles\""]);
    }
}
