//! Collection metadata persistence.
//!
//! Collection definitions live in the `_collections` table. Schema and
//! indexes are stored as JSON text, in the same shape [`Collection`]
//! serializes to.

use std::future::Future;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use oxide_collections::{Collection, CollectionType};
use sqlx::SqliteConnection;

use crate::error::Result;

/// Name of the collection metadata table.
pub const COLLECTIONS_TABLE: &str = "_collections";

/// SQL to create the collection metadata table (SQLite).
pub const CREATE_COLLECTIONS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS _collections (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    type TEXT DEFAULT 'base' NOT NULL,
    system BOOLEAN DEFAULT FALSE NOT NULL,
    schema JSON DEFAULT '[]' NOT NULL,
    indexes JSON DEFAULT '[]' NOT NULL,
    created TEXT DEFAULT (strftime('%Y-%m-%d %H:%M:%fZ')) NOT NULL,
    updated TEXT DEFAULT (strftime('%Y-%m-%d %H:%M:%fZ')) NOT NULL
)
"#;

const CREATE_COLLECTIONS_NAME_INDEX_SQL: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS _collections_name_idx ON _collections (name COLLATE NOCASE)";

const UPSERT_COLLECTION_SQL: &str = r#"
INSERT INTO _collections (id, name, type, system, schema, indexes)
VALUES (?, ?, ?, ?, ?, ?)
ON CONFLICT (id) DO UPDATE SET
    name = excluded.name,
    type = excluded.type,
    system = excluded.system,
    schema = excluded.schema,
    indexes = excluded.indexes,
    updated = strftime('%Y-%m-%d %H:%M:%fZ')
"#;

const SELECT_COLUMNS: &str = "id, name, type, system, schema, indexes, created, updated";

type CollectionRow = (String, String, String, bool, String, String, String, String);

/// A collection whose relation fields point at another collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionReference {
    /// The referencing collection, as currently stored.
    pub collection: Collection,
    /// Ids of its relation fields targeting the referenced collection.
    pub field_ids: Vec<String>,
}

/// A stored collection with its bookkeeping timestamps.
#[derive(Debug, Clone)]
pub struct StoredCollection {
    pub collection: Collection,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Access to collection metadata from inside the sync transaction.
///
/// Every method runs on the caller's connection so metadata writes commit
/// or roll back together with the table changes.
pub trait CollectionStore: Send + Sync {
    /// Loads a collection by id.
    fn find_by_id(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> impl Future<Output = Result<Option<Collection>>> + Send;

    /// Loads a collection by id or case-insensitive name.
    fn find_by_name_or_id(
        &self,
        conn: &mut SqliteConnection,
        name_or_id: &str,
    ) -> impl Future<Output = Result<Option<Collection>>> + Send;

    /// Finds the collections with relation fields targeting `collection`,
    /// skipping the ids in `exclude_ids`. Self-references are included.
    fn find_collection_references(
        &self,
        conn: &mut SqliteConnection,
        collection: &Collection,
        exclude_ids: &[&str],
    ) -> impl Future<Output = Result<Vec<CollectionReference>>> + Send;

    /// Inserts or updates a collection.
    fn save(
        &self,
        conn: &mut SqliteConnection,
        collection: &Collection,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Removes a collection record. Returns whether a record was removed.
    fn delete(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> impl Future<Output = Result<bool>> + Send;
}

/// Collection store backed by the `_collections` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteCollectionStore;

impl SqliteCollectionStore {
    pub fn new() -> Self {
        Self
    }

    /// Ensures the metadata table and its name index exist.
    pub async fn ensure_table(&self, conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(CREATE_COLLECTIONS_TABLE_SQL)
            .execute(&mut *conn)
            .await?;
        sqlx::query(CREATE_COLLECTIONS_NAME_INDEX_SQL)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Loads every collection, oldest first.
    pub async fn all(&self, conn: &mut SqliteConnection) -> Result<Vec<Collection>> {
        Ok(self
            .list(conn)
            .await?
            .into_iter()
            .map(|stored| stored.collection)
            .collect())
    }

    /// Loads every collection with its timestamps, oldest first.
    pub async fn list(&self, conn: &mut SqliteConnection) -> Result<Vec<StoredCollection>> {
        let rows: Vec<CollectionRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM {COLLECTIONS_TABLE} ORDER BY created, rowid"
        ))
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(decode_row).collect()
    }

    async fn fetch_one_where(
        &self,
        conn: &mut SqliteConnection,
        condition: &str,
        value: &str,
    ) -> Result<Option<Collection>> {
        let row: Option<CollectionRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM {COLLECTIONS_TABLE} WHERE {condition} LIMIT 1"
        ))
        .bind(value)
        .fetch_optional(&mut *conn)
        .await?;

        row.map(|row| decode_row(row).map(|stored| stored.collection))
            .transpose()
    }
}

impl CollectionStore for SqliteCollectionStore {
    async fn find_by_id(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> Result<Option<Collection>> {
        self.fetch_one_where(conn, "id = ?1", id).await
    }

    async fn find_by_name_or_id(
        &self,
        conn: &mut SqliteConnection,
        name_or_id: &str,
    ) -> Result<Option<Collection>> {
        // an exact id match wins over a name match
        self.fetch_one_where(
            conn,
            "id = ?1 OR name = ?1 COLLATE NOCASE ORDER BY (id = ?1) DESC",
            name_or_id,
        )
        .await
    }

    async fn find_collection_references(
        &self,
        conn: &mut SqliteConnection,
        collection: &Collection,
        exclude_ids: &[&str],
    ) -> Result<Vec<CollectionReference>> {
        let references = self
            .all(conn)
            .await?
            .into_iter()
            .filter(|candidate| !exclude_ids.contains(&candidate.id.as_str()))
            .filter_map(|candidate| {
                let field_ids: Vec<String> = candidate
                    .fields
                    .iter()
                    .filter(|field| field.references(&collection.id))
                    .map(|field| field.id.clone())
                    .collect();

                (!field_ids.is_empty()).then_some(CollectionReference {
                    collection: candidate,
                    field_ids,
                })
            })
            .collect();

        Ok(references)
    }

    async fn save(&self, conn: &mut SqliteConnection, collection: &Collection) -> Result<()> {
        let schema = serde_json::to_string(&collection.fields)?;
        let indexes = serde_json::to_string(&collection.indexes)?;

        sqlx::query(UPSERT_COLLECTION_SQL)
            .bind(&collection.id)
            .bind(&collection.name)
            .bind(collection.kind.as_str())
            .bind(collection.system)
            .bind(schema)
            .bind(indexes)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, conn: &mut SqliteConnection, id: &str) -> Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {COLLECTIONS_TABLE} WHERE id = ?"))
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Reads a collection record from a JSON file.
pub fn read_collection_file(path: impl AsRef<Path>) -> Result<Collection> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn decode_row(row: CollectionRow) -> Result<StoredCollection> {
    let (id, name, kind, system, schema, indexes, created, updated) = row;

    let collection = Collection {
        id,
        name,
        kind: kind.parse::<CollectionType>()?,
        system,
        fields: serde_json::from_str(&schema)?,
        indexes: serde_json::from_str(&indexes)?,
    };

    Ok(StoredCollection {
        collection,
        created: parse_timestamp(&created),
        updated: parse_timestamp(&updated),
    })
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.fZ")
                .map(|dt| dt.and_utc())
                .unwrap_or_else(|_| Utc::now())
        })
}
