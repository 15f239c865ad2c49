//! Error types for the schema sync engine.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Errors that can occur while synchronizing a record table.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A DDL/DML statement failed.
    #[error("failed to {operation}: {source}")]
    Statement {
        /// What the statement was doing (e.g. "drop column title").
        operation: String,
        /// The offending SQL.
        sql: String,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },

    /// One or more index expressions were rejected.
    #[error("invalid indexes:\n{0}")]
    Validation(ValidationErrors),

    /// A collection referencing the synced one could not be saved.
    #[error("failed to update relation display fields of collection '{collection}': {source}")]
    ReferencePropagation {
        /// Name of the referencing collection.
        collection: String,
        /// Underlying error.
        #[source]
        source: Box<SyncError>,
    },

    /// The collection definition breaks a schema invariant.
    #[error("invalid collection: {0}")]
    InvalidCollection(#[from] oxide_collections::ModelError),

    /// The collection doesn't exist in the metadata store.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// The table doesn't exist in the database.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// The collection can't be deleted while other collections reference it.
    #[error("collection '{collection}' is referenced by: {}", .referenced_by.join(", "))]
    CollectionReferenced {
        /// Name of the collection being deleted.
        collection: String,
        /// Names of the referencing collections.
        referenced_by: Vec<String>,
    },

    /// Database error outside of a schema statement.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (reading collection files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Returns whether the error aborts the sync.
    ///
    /// Validation errors are reported after every other change has been
    /// applied, all other errors roll back the enclosing transaction.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Validation(_))
    }

    /// Returns the index validation errors, if any.
    #[must_use]
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

/// A single validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// Machine readable error code.
    pub code: &'static str,
    /// Human readable message.
    pub message: String,
}

impl ValidationError {
    pub const INVALID_INDEX: &'static str = "validation_invalid_index_expression";
    pub const DUPLICATED_INDEX: &'static str = "validation_duplicated_index_name";

    /// Creates a new validation error.
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Index validation errors keyed by the position of the index expression in
/// the collection's index list.
///
/// Serializes as `{"indexes": {"1": {"code": ..., "message": ...}}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    indexes: BTreeMap<usize, ValidationError>,
}

impl ValidationErrors {
    /// Creates an empty error set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error for the index at `position`.
    ///
    /// The first error recorded for a position wins.
    pub fn add(&mut self, position: usize, error: ValidationError) {
        self.indexes.entry(position).or_insert(error);
    }

    /// Returns the error for the index at `position`.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&ValidationError> {
        self.indexes.get(&position)
    }

    /// Returns the positions that have errors, in ascending order.
    #[must_use]
    pub fn positions(&self) -> Vec<usize> {
        self.indexes.keys().copied().collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    /// Converts into `Err(SyncError::Validation)` unless empty.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, error) in &self.indexes {
            writeln!(f, "  - indexes.{position}: {}", error.message)?;
        }
        Ok(())
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
