//! Collection schema definitions.
//!
//! A [`Collection`] describes one record table: an ordered list of typed
//! [`Field`]s and the raw index expressions of the table. Fields are
//! identified by a stable id, so a rename is always distinguishable from a
//! delete followed by an add.
//!
//! # Example
//!
//! ```rust
//! use oxide_collections::{Collection, Field};
//!
//! let posts = Collection::new("pbc_posts", "posts")
//!     .field(Field::text("f_title", "title").required())
//!     .field(Field::select("f_tags", "tags", 5, &["news", "tech"]))
//!     .index("CREATE INDEX idx_posts_title ON posts (title)");
//!
//! assert!(posts.validate().is_ok());
//! assert!(posts.field_by_id("f_tags").unwrap().is_multiple());
//! ```

pub mod collection;
pub mod error;
pub mod field;

pub use collection::{
    AUTH_SYSTEM_FIELDS, BASE_SYSTEM_FIELDS, Collection, CollectionType, FIELD_NAME_CREATED,
    FIELD_NAME_EMAIL, FIELD_NAME_EMAIL_VISIBILITY, FIELD_NAME_ID, FIELD_NAME_LAST_RESET_SENT_AT,
    FIELD_NAME_LAST_VERIFICATION_SENT_AT, FIELD_NAME_PASSWORD_HASH, FIELD_NAME_TOKEN_KEY,
    FIELD_NAME_UPDATED, FIELD_NAME_USERNAME, FIELD_NAME_VERIFIED,
};
pub use error::{ModelError, Result};
pub use field::{
    Cardinality, Field, FieldKind, FieldOptions, FileOptions, NumberOptions, RelationOptions,
    SelectOptions, TextOptions,
};
