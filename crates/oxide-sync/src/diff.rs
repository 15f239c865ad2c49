//! Schema diffing.
//!
//! Compares two versions of the same collection and reports what changed.
//! Fields are matched by their stable id, never by name: swapping the names of
//! two fields is a pair of renames, not a delete followed by an add.

use std::collections::BTreeMap;

use oxide_collections::{Cardinality, Collection, Field};

/// A table rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRename {
    pub from: String,
    pub to: String,
}

/// A field whose name changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRename {
    pub field_id: String,
    pub from: String,
    pub to: String,
}

/// A field whose storage cardinality changed.
#[derive(Debug, Clone, PartialEq)]
pub struct CardinalityChange {
    /// The field as defined in the new schema.
    pub field: Field,
    pub from: Cardinality,
    pub to: Cardinality,
}

/// The difference between two versions of a collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDelta {
    pub table_rename: Option<TableRename>,
    /// Old names of the fields that no longer exist.
    pub deleted_fields: Vec<String>,
    pub added_fields: Vec<Field>,
    pub renamed_fields: Vec<FieldRename>,
    pub cardinality_changes: Vec<CardinalityChange>,
}

impl SchemaDelta {
    /// Computes the delta turning `old` into `new`.
    ///
    /// Without an `old` version the collection is being created and the delta
    /// is empty.
    #[must_use]
    pub fn between(new: &Collection, old: Option<&Collection>) -> Self {
        let Some(old) = old else {
            return Self::default();
        };

        let table_rename = (!old.name.eq_ignore_ascii_case(&new.name)).then(|| TableRename {
            from: old.name.clone(),
            to: new.name.clone(),
        });

        let deleted_fields = old
            .fields
            .iter()
            .filter(|f| new.field_by_id(&f.id).is_none())
            .map(|f| f.name.clone())
            .collect();

        let mut added_fields = Vec::new();
        let mut renamed_fields = Vec::new();
        let mut cardinality_changes = Vec::new();

        for field in &new.fields {
            let Some(old_field) = old.field_by_id(&field.id) else {
                added_fields.push(field.clone());
                continue;
            };

            if old_field.name != field.name {
                renamed_fields.push(FieldRename {
                    field_id: field.id.clone(),
                    from: old_field.name.clone(),
                    to: field.name.clone(),
                });
            }

            if old_field.cardinality() != field.cardinality() {
                cardinality_changes.push(CardinalityChange {
                    field: field.clone(),
                    from: old_field.cardinality(),
                    to: field.cardinality(),
                });
            }
        }

        Self {
            table_rename,
            deleted_fields,
            added_fields,
            renamed_fields,
            cardinality_changes,
        }
    }

    /// Returns whether the table has to be renamed.
    #[must_use]
    pub fn table_renamed(&self) -> bool {
        self.table_rename.is_some()
    }

    /// Returns the old name → new name mapping of renamed fields.
    #[must_use]
    pub fn renamed_names(&self) -> BTreeMap<&str, &str> {
        self.renamed_fields
            .iter()
            .map(|r| (r.from.as_str(), r.to.as_str()))
            .collect()
    }

    /// Returns whether the rename of `field_id` is part of the delta.
    #[must_use]
    pub fn rename_of(&self, field_id: &str) -> Option<&FieldRename> {
        self.renamed_fields.iter().find(|r| r.field_id == field_id)
    }

    /// Returns whether any field name disappeared (renamed or deleted).
    #[must_use]
    pub fn affects_field_names(&self) -> bool {
        !self.renamed_fields.is_empty() || !self.deleted_fields.is_empty()
    }

    /// Returns whether the delta changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table_rename.is_none()
            && self.deleted_fields.is_empty()
            && self.added_fields.is_empty()
            && self.renamed_fields.is_empty()
            && self.cardinality_changes.is_empty()
    }
}
