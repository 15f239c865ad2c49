//! Record table schema sync for collections.
//!
//! `oxide-sync` keeps the physical SQLite table of a collection in line with
//! its editable definition. Given the new and the previous version of a
//! [`Collection`](oxide_collections::Collection) it:
//!
//! - creates the table, system columns and (for auth collections) the auth
//!   unique indexes of a new collection
//! - renames the table, drops deleted columns, adds and renames columns
//!   without ever colliding on a name (fields are tracked by id)
//! - converts stored values when a field switches between single and
//!   multiple values
//! - rewrites the display fields of relations pointing at the collection
//! - rebuilds the user indexes, reporting invalid ones by position
//!
//! Everything runs in one transaction: either the table ends up fully in
//! sync, or nothing changes. Rejected indexes are the exception, they are
//! reported after the rest of the sync has been committed.
//!
//! # Architecture
//!
//! - **Diff** - compares two versions of a collection by field id
//! - **Plan** - the ordered [`TableOperation`](operations::TableOperation)s of
//!   each sync step, usable as a dry run
//! - **Dialect** - renders operations as SQL
//! - **Executor** - runs operations on the sync transaction
//! - **Store** - collection metadata in the `_collections` table
//! - **Sync** - the orchestrator tying it all together
//!
//! # Example
//!
//! ```rust,no_run
//! use oxide_collections::{Collection, Field};
//! use oxide_sync::prelude::*;
//! use sqlx::sqlite::SqlitePoolOptions;
//!
//! # async fn run() -> oxide_sync::Result<()> {
//! let pool = SqlitePoolOptions::new().connect("sqlite:data.db?mode=rwc").await?;
//! let sync = SchemaSync::new(pool);
//! sync.init().await?;
//!
//! let posts = Collection::new("pbc_posts", "posts")
//!     .field(Field::text("f_title", "title"))
//!     .index("CREATE INDEX idx_posts_title ON posts (title)");
//! sync.save_collection(&posts).await?;
//!
//! let mut renamed = posts.clone();
//! renamed.fields[0].name = "heading".to_string();
//! sync.save_collection(&renamed).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Create the metadata table
//! oxide-sync init
//!
//! # Save a collection and sync its table
//! oxide-sync apply posts.json
//!
//! # Show the SQL `apply` would run
//! oxide-sync sql posts.json
//! ```

pub mod dialect;
pub mod diff;
pub mod error;
pub mod executor;
pub mod index;
pub mod introspect;
pub mod mutator;
pub mod normalize;
pub mod operations;
pub mod plan;
pub mod propagate;
pub mod store;
pub mod sync;

pub use error::{Result, SyncError, ValidationError, ValidationErrors};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::dialect::{SqliteDialect, SyncDialect};
    pub use crate::diff::SchemaDelta;
    pub use crate::error::{Result, SyncError, ValidationError, ValidationErrors};
    pub use crate::executor::StatementExecutor;
    pub use crate::index::IndexDescriptor;
    pub use crate::operations::TableOperation;
    pub use crate::plan::{SyncMode, SyncPlan, SyncStep};
    pub use crate::store::{CollectionReference, CollectionStore, SqliteCollectionStore};
    pub use crate::sync::SchemaSync;
}
