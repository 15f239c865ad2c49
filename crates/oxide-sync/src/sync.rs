//! Schema sync orchestration.
//!
//! [`SchemaSync`] drives a [`SyncPlan`] against the database inside a single
//! transaction and keeps the collection metadata consistent with it.

use oxide_collections::Collection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, info, warn};

use crate::dialect::{SqliteDialect, SyncDialect};
use crate::error::{Result, SyncError};
use crate::executor::StatementExecutor;
use crate::introspect;
use crate::plan::{SyncPlan, SyncStep};
use crate::propagate::propagate_display_fields;
use crate::store::{CollectionStore, SqliteCollectionStore};

/// Keeps record tables in sync with their collection definitions.
pub struct SchemaSync<S: CollectionStore = SqliteCollectionStore> {
    pool: SqlitePool,
    store: S,
    executor: StatementExecutor<SqliteDialect>,
}

impl SchemaSync<SqliteCollectionStore> {
    /// Creates a sync engine backed by the `_collections` table.
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_store(pool, SqliteCollectionStore::new())
    }

    /// Ensures the collection metadata table exists.
    pub async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        self.store.ensure_table(&mut conn).await
    }
}

impl<S: CollectionStore> SchemaSync<S> {
    /// Creates a sync engine with a custom metadata store.
    pub fn with_store(pool: SqlitePool, store: S) -> Self {
        Self {
            pool,
            store,
            executor: StatementExecutor::new(SqliteDialect::new()),
        }
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn executor(&self) -> &StatementExecutor<SqliteDialect> {
        &self.executor
    }

    /// Plans the sync of `new` against `old` without touching the database.
    pub fn plan(&self, new: &Collection, old: Option<&Collection>) -> Result<SyncPlan> {
        SyncPlan::build(new, old)
    }

    /// Brings the record table of `new` in line with its definition.
    ///
    /// `old` is the previously stored version, `None` when the collection is
    /// being created. All changes run in one transaction. Index validation
    /// errors are returned after the transaction is committed; any other
    /// error rolls everything back.
    pub async fn sync_record_table_schema(
        &self,
        new: &Collection,
        old: Option<&Collection>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let outcome = self.sync_in(&mut tx, new, old).await;
        finish(tx, outcome).await
    }

    /// Runs the sync on an existing connection or transaction.
    pub async fn sync_in(
        &self,
        conn: &mut SqliteConnection,
        new: &Collection,
        old: Option<&Collection>,
    ) -> Result<()> {
        let plan = self.plan(new, old)?;
        info!(
            collection = %new.name,
            dialect = self.executor.dialect().name(),
            mode = %plan.mode,
            operations = plan.operations().count(),
            "Syncing record table schema"
        );

        let mut index_errors = plan.index_errors.clone();
        for step in &plan.steps {
            debug!(
                collection = %new.name,
                step = %step.step,
                operations = step.operations.len(),
                "Running sync step"
            );

            let outcome = if step.step == SyncStep::PropagateRelationRenames {
                propagate_display_fields(conn, &self.store, new, &plan.delta)
                    .await
                    .map(|saved| {
                        if !saved.is_empty() {
                            info!(
                                collection = %new.name,
                                updated = ?saved,
                                "Relation display fields updated"
                            );
                        }
                    })
            } else {
                self.executor
                    .execute_step(conn, step, &mut index_errors)
                    .await
            };

            if let Err(err) = outcome {
                warn!(
                    collection = %new.name,
                    step = %step.step,
                    error = %err,
                    "Record table sync failed"
                );
                return Err(err);
            }
        }

        if !index_errors.is_empty() {
            warn!(
                collection = %new.name,
                positions = ?index_errors.positions(),
                "Some indexes were rejected"
            );
        }
        index_errors.into_result()?;

        info!(collection = %new.name, "Record table schema synced");
        Ok(())
    }

    /// Saves a collection and syncs its record table in one transaction.
    pub async fn save_collection(&self, collection: &Collection) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let outcome = self.save_in(&mut tx, collection).await;
        finish(tx, outcome).await
    }

    /// Saves a collection and syncs its record table on an existing
    /// connection or transaction.
    pub async fn save_in(
        &self,
        conn: &mut SqliteConnection,
        collection: &Collection,
    ) -> Result<()> {
        collection.validate()?;

        let old = self.store.find_by_id(conn, &collection.id).await?;
        self.store.save(conn, collection).await?;
        self.sync_in(conn, collection, old.as_ref()).await
    }

    /// Deletes a collection and drops its record table.
    ///
    /// Fails if other collections still reference it.
    pub async fn delete_collection(&self, name_or_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let outcome = self.delete_in(&mut tx, name_or_id).await;
        finish(tx, outcome).await
    }

    /// Deletes a collection on an existing connection or transaction.
    pub async fn delete_in(&self, conn: &mut SqliteConnection, name_or_id: &str) -> Result<()> {
        let collection = self
            .store
            .find_by_name_or_id(conn, name_or_id)
            .await?
            .ok_or_else(|| SyncError::CollectionNotFound(name_or_id.to_string()))?;

        let references = self
            .store
            .find_collection_references(conn, &collection, &[collection.id.as_str()])
            .await?;
        if !references.is_empty() {
            return Err(SyncError::CollectionReferenced {
                collection: collection.name,
                referenced_by: references
                    .into_iter()
                    .map(|r| r.collection.name)
                    .collect(),
            });
        }

        if !collection.is_view() {
            introspect::delete_table(conn, &collection.name).await?;
        }
        self.store.delete(conn, &collection.id).await?;

        info!(collection = %collection.name, "Collection deleted");
        Ok(())
    }
}

/// Commits unless the outcome is a fatal error; dropping the transaction
/// rolls it back.
async fn finish(tx: Transaction<'_, Sqlite>, outcome: Result<()>) -> Result<()> {
    match outcome {
        Err(err) if err.is_fatal() => Err(err),
        outcome => {
            tx.commit().await?;
            outcome
        }
    }
}
