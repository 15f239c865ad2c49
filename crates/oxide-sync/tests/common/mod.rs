#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use oxide_collections::Collection;
use oxide_sync::prelude::*;
use oxide_sync::store::{CollectionReference, SqliteCollectionStore};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{SqliteConnection, SqlitePool};

pub async fn create_test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");

    let mut conn = pool.acquire().await.unwrap();
    SqliteCollectionStore::new()
        .ensure_table(&mut conn)
        .await
        .unwrap();
    drop(conn);

    pool
}

/// Runs a query returning one text column per row.
pub async fn column_values(pool: &SqlitePool, sql: &str) -> Vec<String> {
    sqlx::query_scalar(sql).fetch_all(pool).await.unwrap()
}

pub async fn columns(pool: &SqlitePool, table: &str) -> Vec<String> {
    let mut conn = pool.acquire().await.unwrap();
    oxide_sync::introspect::table_columns(&mut conn, table)
        .await
        .unwrap()
}

pub async fn index_names(pool: &SqlitePool, table: &str) -> Vec<String> {
    let mut conn = pool.acquire().await.unwrap();
    oxide_sync::introspect::table_indexes(&mut conn, table)
        .await
        .unwrap()
        .into_keys()
        .collect()
}

pub async fn has_table(pool: &SqlitePool, table: &str) -> bool {
    let mut conn = pool.acquire().await.unwrap();
    oxide_sync::introspect::has_table(&mut conn, table)
        .await
        .unwrap()
}

pub async fn stored(pool: &SqlitePool, id: &str) -> Collection {
    let mut conn = pool.acquire().await.unwrap();
    SqliteCollectionStore::new()
        .find_by_id(&mut conn, id)
        .await
        .unwrap()
        .expect("collection is stored")
}

/// Store wrapper counting the saves of each collection id.
#[derive(Debug, Default, Clone)]
pub struct CountingStore {
    inner: SqliteCollectionStore,
    saves: Arc<Mutex<HashMap<String, usize>>>,
}

impl CountingStore {
    pub fn saves(&self, id: &str) -> usize {
        self.saves.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn reset(&self) {
        self.saves.lock().unwrap().clear();
    }
}

impl CollectionStore for CountingStore {
    async fn find_by_id(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> oxide_sync::Result<Option<Collection>> {
        self.inner.find_by_id(conn, id).await
    }

    async fn find_by_name_or_id(
        &self,
        conn: &mut SqliteConnection,
        name_or_id: &str,
    ) -> oxide_sync::Result<Option<Collection>> {
        self.inner.find_by_name_or_id(conn, name_or_id).await
    }

    async fn find_collection_references(
        &self,
        conn: &mut SqliteConnection,
        collection: &Collection,
        exclude_ids: &[&str],
    ) -> oxide_sync::Result<Vec<CollectionReference>> {
        self.inner
            .find_collection_references(conn, collection, exclude_ids)
            .await
    }

    async fn save(
        &self,
        conn: &mut SqliteConnection,
        collection: &Collection,
    ) -> oxide_sync::Result<()> {
        *self
            .saves
            .lock()
            .unwrap()
            .entry(collection.id.clone())
            .or_default() += 1;
        self.inner.save(conn, collection).await
    }

    async fn delete(&self, conn: &mut SqliteConnection, id: &str) -> oxide_sync::Result<bool> {
        self.inner.delete(conn, id).await
    }
}
