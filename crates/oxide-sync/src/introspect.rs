//! Table introspection helpers over the SQLite catalog.

use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::SqliteConnection;

use crate::dialect::quote_identifier;
use crate::error::{Result, SyncError};

/// One column of a table, as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub position: i64,
    pub name: String,
    /// Declared column type.
    #[serde(rename = "type")]
    pub kind: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

/// Checks if a table or view with the given name exists (case-insensitive).
pub async fn has_table(conn: &mut SqliteConnection, table: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ? COLLATE NOCASE",
    )
    .bind(table)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count > 0)
}

/// Returns the column names of a table, in declaration order.
pub async fn table_columns(conn: &mut SqliteConnection, table: &str) -> Result<Vec<String>> {
    let names: Vec<String> =
        sqlx::query_scalar("SELECT name FROM pragma_table_info(?) ORDER BY cid")
            .bind(table)
            .fetch_all(&mut *conn)
            .await?;

    Ok(names)
}

/// Returns the column definitions of a table.
///
/// Fails with [`SyncError::TableNotFound`] if the table has no columns.
pub async fn table_info(conn: &mut SqliteConnection, table: &str) -> Result<Vec<ColumnInfo>> {
    let rows: Vec<(i64, String, String, bool, Option<String>, i64)> = sqlx::query_as(
        r#"SELECT cid, name, type, "notnull", dflt_value, pk FROM pragma_table_info(?) ORDER BY cid"#,
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await?;

    if rows.is_empty() {
        return Err(SyncError::TableNotFound(table.to_string()));
    }

    Ok(rows
        .into_iter()
        .map(
            |(position, name, kind, not_null, default_value, pk)| ColumnInfo {
                position,
                name,
                kind,
                not_null,
                default_value,
                primary_key: pk > 0,
            },
        )
        .collect())
}

/// Returns the indexes of a table as `name => CREATE INDEX sql`.
///
/// Automatic indexes (primary keys, inline unique constraints) have no SQL
/// and are skipped.
pub async fn table_indexes(
    conn: &mut SqliteConnection,
    table: &str,
) -> Result<BTreeMap<String, String>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT name, sql FROM sqlite_master \
         WHERE type = 'index' AND sql IS NOT NULL AND sql != '' AND tbl_name = ? COLLATE NOCASE",
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Drops a table if it exists.
pub async fn delete_table(conn: &mut SqliteConnection, table: &str) -> Result<()> {
    let sql = format!("DROP TABLE IF EXISTS {}", quote_identifier(table));
    sqlx::raw_sql(&sql).execute(&mut *conn).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    async fn setup() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let mut conn = pool.acquire().await.unwrap();
        sqlx::raw_sql(
            "CREATE TABLE posts (id TEXT PRIMARY KEY NOT NULL, title TEXT DEFAULT '' NOT NULL, views NUMERIC);
             CREATE INDEX idx_title ON posts (title);",
        )
        .execute(&mut *conn)
        .await
        .unwrap();
        drop(conn);
        pool
    }

    #[tokio::test]
    async fn test_has_table() {
        let pool = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        assert!(has_table(&mut conn, "posts").await.unwrap());
        assert!(has_table(&mut conn, "POSTS").await.unwrap());
        assert!(!has_table(&mut conn, "missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_table_columns_and_info() {
        let pool = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(
            table_columns(&mut conn, "posts").await.unwrap(),
            vec!["id", "title", "views"]
        );

        let info = table_info(&mut conn, "posts").await.unwrap();
        assert!(info[0].primary_key);
        assert_eq!(info[1].default_value.as_deref(), Some("''"));
        assert!(info[1].not_null);
        assert!(!info[2].not_null);
        assert_eq!(info[2].kind, "NUMERIC");

        assert!(matches!(
            table_info(&mut conn, "missing").await,
            Err(SyncError::TableNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_table_indexes_skip_automatic() {
        let pool = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        let indexes = table_indexes(&mut conn, "posts").await.unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes["idx_title"], "CREATE INDEX idx_title ON posts (title)");
    }

    #[tokio::test]
    async fn test_delete_table() {
        let pool = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        delete_table(&mut conn, "posts").await.unwrap();
        delete_table(&mut conn, "posts").await.unwrap();
        assert!(!has_table(&mut conn, "posts").await.unwrap());
    }
}
