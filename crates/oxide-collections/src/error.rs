//! Error types for collection definitions.

use thiserror::Error;

/// Errors raised while decoding or validating a collection definition.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The collection has no name.
    #[error("collection name must not be empty")]
    EmptyCollectionName,

    /// A field has no id.
    #[error("field at position {0} has an empty id")]
    EmptyFieldId(usize),

    /// A field has no name.
    #[error("field '{0}' has an empty name")]
    EmptyFieldName(String),

    /// Two fields share the same id.
    #[error("duplicated field id '{0}'")]
    DuplicateFieldId(String),

    /// Two fields share the same name (case-insensitive).
    #[error("duplicated field name '{0}'")]
    DuplicateFieldName(String),

    /// A field name collides with a system column.
    #[error("field name '{0}' is reserved for a system column")]
    ReservedFieldName(String),

    /// A field id collides with a system column.
    #[error("field id '{0}' is reserved for a system column")]
    ReservedFieldId(String),

    /// The collection type is not known.
    #[error("unknown collection type '{0}'")]
    UnknownCollectionType(String),

    /// The field type is not known.
    #[error("unknown field type '{0}'")]
    UnknownFieldType(String),

    /// The field options don't match the shape expected by the field type.
    #[error("invalid options for {kind} field '{field}': {source}")]
    InvalidOptions {
        /// Field type name.
        kind: String,
        /// Field name.
        field: String,
        /// Decoding error.
        #[source]
        source: serde_json::Error,
    },
}

/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
