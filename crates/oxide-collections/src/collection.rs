//! Collections: the logical schema of one record table.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::field::Field;

/// Primary key column of every record table.
pub const FIELD_NAME_ID: &str = "id";
/// Creation timestamp column of every record table.
pub const FIELD_NAME_CREATED: &str = "created";
/// Last update timestamp column of every record table.
pub const FIELD_NAME_UPDATED: &str = "updated";

pub const FIELD_NAME_USERNAME: &str = "username";
pub const FIELD_NAME_EMAIL: &str = "email";
pub const FIELD_NAME_EMAIL_VISIBILITY: &str = "emailVisibility";
pub const FIELD_NAME_VERIFIED: &str = "verified";
pub const FIELD_NAME_TOKEN_KEY: &str = "tokenKey";
pub const FIELD_NAME_PASSWORD_HASH: &str = "passwordHash";
pub const FIELD_NAME_LAST_RESET_SENT_AT: &str = "lastResetSentAt";
pub const FIELD_NAME_LAST_VERIFICATION_SENT_AT: &str = "lastVerificationSentAt";

/// System columns owned by every record table.
pub const BASE_SYSTEM_FIELDS: [&str; 3] = [FIELD_NAME_ID, FIELD_NAME_CREATED, FIELD_NAME_UPDATED];

/// Additional system columns owned by auth record tables.
pub const AUTH_SYSTEM_FIELDS: [&str; 8] = [
    FIELD_NAME_USERNAME,
    FIELD_NAME_EMAIL,
    FIELD_NAME_EMAIL_VISIBILITY,
    FIELD_NAME_VERIFIED,
    FIELD_NAME_TOKEN_KEY,
    FIELD_NAME_PASSWORD_HASH,
    FIELD_NAME_LAST_RESET_SENT_AT,
    FIELD_NAME_LAST_VERIFICATION_SENT_AT,
];

/// The kind of a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionType {
    /// Plain record table.
    #[default]
    Base,
    /// Record table with the auth system columns.
    Auth,
    /// Read only view, owns no table and no indexes.
    View,
}

impl CollectionType {
    /// Returns the type name used in collection records.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Auth => "auth",
            Self::View => "view",
        }
    }
}

impl fmt::Display for CollectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for CollectionType {
    type Err = ModelError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "base" => Ok(Self::Base),
            "auth" => Ok(Self::Auth),
            "view" => Ok(Self::View),
            other => Err(ModelError::UnknownCollectionType(other.to_string())),
        }
    }
}

/// A collection definition.
///
/// `name` is also the physical table name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: CollectionType,
    #[serde(default)]
    pub system: bool,
    /// Ordered schema fields.
    #[serde(rename = "schema", default)]
    pub fields: Vec<Field>,
    /// Raw `CREATE INDEX` expressions.
    #[serde(default)]
    pub indexes: Vec<String>,
}

impl Collection {
    /// Creates an empty base collection.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: CollectionType::Base,
            system: false,
            fields: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Sets the collection type.
    #[must_use]
    pub fn with_type(mut self, kind: CollectionType) -> Self {
        self.kind = kind;
        self
    }

    /// Appends a schema field.
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Appends a raw index expression.
    #[must_use]
    pub fn index(mut self, expression: impl Into<String>) -> Self {
        self.indexes.push(expression.into());
        self
    }

    #[must_use]
    pub fn is_auth(&self) -> bool {
        self.kind == CollectionType::Auth
    }

    #[must_use]
    pub fn is_view(&self) -> bool {
        self.kind == CollectionType::View
    }

    /// Returns the field with the given id.
    #[must_use]
    pub fn field_by_id(&self, id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Returns a mutable reference to the field with the given id.
    pub fn field_by_id_mut(&mut self, id: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.id == id)
    }

    /// Returns the field with the given name.
    #[must_use]
    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the names of the system columns of this collection's table.
    #[must_use]
    pub fn system_field_names(&self) -> Vec<&'static str> {
        let mut names = BASE_SYSTEM_FIELDS.to_vec();
        if self.is_auth() {
            names.extend(AUTH_SYSTEM_FIELDS);
        }
        names
    }

    /// Checks the schema invariants: a non-empty collection name, non-empty
    /// and unique field ids, non-empty field names that are unique
    /// (case-insensitive), and no field id or name shadowing a system column.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ModelError::EmptyCollectionName);
        }

        let reserved: HashSet<String> = self
            .system_field_names()
            .into_iter()
            .map(str::to_lowercase)
            .collect();
        let mut ids = HashSet::new();
        let mut names = HashSet::new();

        for (position, field) in self.fields.iter().enumerate() {
            if field.id.is_empty() {
                return Err(ModelError::EmptyFieldId(position));
            }
            if field.name.trim().is_empty() {
                return Err(ModelError::EmptyFieldName(field.id.clone()));
            }
            if !ids.insert(field.id.as_str()) {
                return Err(ModelError::DuplicateFieldId(field.id.clone()));
            }
            if reserved.contains(&field.id.to_lowercase()) {
                return Err(ModelError::ReservedFieldId(field.id.clone()));
            }

            let lower = field.name.to_lowercase();
            if reserved.contains(&lower) {
                return Err(ModelError::ReservedFieldName(field.name.clone()));
            }
            if !names.insert(lower) {
                return Err(ModelError::DuplicateFieldName(field.name.clone()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use serde_json::json;

    fn posts() -> Collection {
        Collection::new("posts0", "posts")
            .field(Field::text("f1", "title"))
            .field(Field::select("f2", "tags", 3, &["a", "b"]))
    }

    #[test]
    fn test_lookup_by_id_and_name() {
        let c = posts();
        assert_eq!(c.field_by_id("f2").map(|f| f.name.as_str()), Some("tags"));
        assert_eq!(c.field_by_name("title").map(|f| f.id.as_str()), Some("f1"));
        assert!(c.field_by_id("missing").is_none());
    }

    #[test]
    fn test_validate_ok() {
        posts().validate().unwrap();
    }

    #[test]
    fn test_validate_duplicate_name() {
        let c = posts().field(Field::text("f3", "Title"));
        assert!(matches!(
            c.validate(),
            Err(ModelError::DuplicateFieldName(name)) if name == "Title"
        ));
    }

    #[test]
    fn test_validate_reserved_names() {
        let c = posts().field(Field::text("f3", "created"));
        assert!(matches!(c.validate(), Err(ModelError::ReservedFieldName(_))));

        // auth columns are only reserved on auth collections
        let c = posts().field(Field::text("f3", "email"));
        c.validate().unwrap();
        let c = c.with_type(CollectionType::Auth);
        assert!(matches!(c.validate(), Err(ModelError::ReservedFieldName(_))));
    }

    #[test]
    fn test_validate_reserved_ids() {
        let c = posts().field(Field::text("created", "published"));
        assert!(matches!(
            c.validate(),
            Err(ModelError::ReservedFieldId(id)) if id == "created"
        ));

        let c = posts().field(Field::text("tokenKey", "token"));
        c.validate().unwrap();
        let c = c.with_type(CollectionType::Auth);
        assert!(matches!(c.validate(), Err(ModelError::ReservedFieldId(_))));
    }

    #[test]
    fn test_validate_duplicate_id() {
        let c = posts().field(Field::text("f1", "other"));
        assert!(matches!(c.validate(), Err(ModelError::DuplicateFieldId(_))));
    }

    #[test]
    fn test_validate_empty_names() {
        assert!(matches!(
            Collection::new("x", " ").validate(),
            Err(ModelError::EmptyCollectionName)
        ));
        let c = posts().field(Field::text("f3", ""));
        assert!(matches!(c.validate(), Err(ModelError::EmptyFieldName(_))));
    }

    #[test]
    fn test_collection_type_names() {
        for kind in [CollectionType::Base, CollectionType::Auth, CollectionType::View] {
            assert_eq!(kind.as_str().parse::<CollectionType>().unwrap(), kind);
        }
        assert!("table".parse::<CollectionType>().is_err());
    }

    #[test]
    fn test_decode_record() {
        let c: Collection = serde_json::from_value(json!({
            "id": "users0",
            "name": "users",
            "type": "auth",
            "schema": [
                {"id": "f1", "name": "name", "type": "text", "options": {"max": 100}}
            ],
            "indexes": ["CREATE INDEX idx_name ON users (name)"]
        }))
        .unwrap();

        assert!(c.is_auth());
        assert_eq!(c.fields.len(), 1);
        assert_eq!(c.indexes.len(), 1);
        assert_eq!(c.system_field_names().len(), 11);
    }
}
