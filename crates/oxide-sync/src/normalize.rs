//! Multi-value normalizer.
//!
//! When a field switches between single and multiple values its column
//! changes representation (scalar ⇄ JSON array). The column is rebuilt in
//! place:
//!
//! 1. add a temporary column with the new definition
//! 2. copy the converted values into it
//! 3. drop the original column
//! 4. rename the temporary column to the field name
//!
//! Converting multiple → single keeps the **last** element of the array.
//! File fields only have their row values converted; the stored files of the
//! dropped entries are left in place.

use oxide_collections::{Cardinality, Collection};

use crate::diff::SchemaDelta;
use crate::mutator::temp_column_name;
use crate::operations::{TableOperation, ValueConversion};

/// Plans the value conversions for every cardinality change in `delta`.
///
/// Field names are the final (already renamed) names.
#[must_use]
pub fn normalize_cardinality(collection: &Collection, delta: &SchemaDelta) -> Vec<TableOperation> {
    if collection.is_view() {
        return Vec::new();
    }

    let table = collection.name.as_str();
    let mut operations = Vec::with_capacity(delta.cardinality_changes.len() * 4);

    for change in &delta.cardinality_changes {
        let field = &change.field;
        let temp_name = temp_column_name(&format!("_{}", field.name));
        let conversion = match change.to {
            Cardinality::Multiple => ValueConversion::SingleToMultiple,
            Cardinality::Single => ValueConversion::MultipleToSingle,
        };

        operations.extend([
            TableOperation::add_column(table, &temp_name, field.column_definition()),
            TableOperation::ConvertValues {
                table: table.to_string(),
                source: field.name.clone(),
                target: temp_name.clone(),
                conversion,
            },
            TableOperation::drop_column(table, &field.name),
            TableOperation::rename_column(table, temp_name, &field.name),
        ]);
    }

    operations
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxide_collections::{CollectionType, Field};

    #[test]
    fn test_no_changes() {
        let c = Collection::new("posts0", "posts").field(Field::select("f1", "tags", 3, &[]));
        let delta = SchemaDelta::between(&c, Some(&c));
        assert!(normalize_cardinality(&c, &delta).is_empty());
    }

    #[test]
    fn test_single_to_multiple_sequence() {
        let old = Collection::new("posts0", "posts").field(Field::select("f1", "tag", 1, &[]));
        let new = Collection::new("posts0", "posts").field(Field::select("f1", "tags", 3, &[]));
        let delta = SchemaDelta::between(&new, Some(&old));

        let ops = normalize_cardinality(&new, &delta);
        assert_eq!(ops.len(), 4);

        let TableOperation::AddColumn { column, .. } = &ops[0] else {
            panic!("expected add column, got {:?}", ops[0]);
        };
        assert!(column.name.starts_with("_tags"));
        assert_eq!(column.definition, "JSON DEFAULT '[]' NOT NULL");

        assert_eq!(
            ops[1],
            TableOperation::ConvertValues {
                table: "posts".to_string(),
                source: "tags".to_string(),
                target: column.name.clone(),
                conversion: ValueConversion::SingleToMultiple,
            }
        );
        assert_eq!(ops[2], TableOperation::drop_column("posts", "tags"));
        assert_eq!(
            ops[3],
            TableOperation::rename_column("posts", column.name.clone(), "tags")
        );
    }

    #[test]
    fn test_multiple_to_single_direction() {
        let old = Collection::new("posts0", "posts")
            .field(Field::relation("f1", "author", "users0", None, &[]));
        let new = Collection::new("posts0", "posts")
            .field(Field::relation("f1", "author", "users0", Some(1), &[]));
        let delta = SchemaDelta::between(&new, Some(&old));

        let ops = normalize_cardinality(&new, &delta);
        assert!(matches!(
            ops[1],
            TableOperation::ConvertValues {
                conversion: ValueConversion::MultipleToSingle,
                ..
            }
        ));
    }

    #[test]
    fn test_view_is_noop() {
        let old = Collection::new("v0", "v")
            .with_type(CollectionType::View)
            .field(Field::select("f1", "tag", 1, &[]));
        let mut new = old.clone();
        new.fields[0] = Field::select("f1", "tag", 2, &[]);
        let delta = SchemaDelta::between(&new, Some(&old));

        assert!(normalize_cardinality(&new, &delta).is_empty());
    }
}
