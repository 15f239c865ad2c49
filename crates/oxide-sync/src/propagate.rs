//! Relation display field propagation.
//!
//! Relation fields cache the names of the target collection's fields they
//! display. When the target renames or deletes fields, those names are
//! rewritten in every referencing collection, including the target itself
//! when it references itself.

use std::collections::BTreeMap;

use oxide_collections::Collection;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::diff::SchemaDelta;
use crate::error::{Result, SyncError};
use crate::store::CollectionStore;

/// Rewrites a display field list: deleted names are removed, renamed names
/// are replaced. Each name is looked up once, so swapped names stay swapped.
#[must_use]
pub fn rewrite_display_fields(
    display_fields: &[String],
    deleted: &[String],
    renamed: &BTreeMap<&str, &str>,
) -> Vec<String> {
    display_fields
        .iter()
        .filter(|name| !deleted.contains(*name))
        .map(|name| {
            renamed
                .get(name.as_str())
                .map_or_else(|| name.clone(), |to| (*to).to_string())
        })
        .collect()
}

/// Updates the display fields of every relation pointing at `collection`.
///
/// Each referencing collection is saved at most once, and only if one of its
/// relation fields changed. Returns the names of the saved collections.
pub async fn propagate_display_fields<S: CollectionStore>(
    conn: &mut SqliteConnection,
    store: &S,
    collection: &Collection,
    delta: &SchemaDelta,
) -> Result<Vec<String>> {
    if !delta.affects_field_names() {
        return Ok(Vec::new());
    }

    let renamed = delta.renamed_names();
    let references = store
        .find_collection_references(conn, collection, &[])
        .await?;
    let mut saved = Vec::new();

    for reference in references {
        // a self-reference is patched on the new definition, not the stored one
        let (mut owner, field_ids) = if reference.collection.id == collection.id {
            let ids: Vec<String> = collection
                .fields
                .iter()
                .filter(|f| f.references(&collection.id))
                .map(|f| f.id.clone())
                .collect();
            (collection.clone(), ids)
        } else {
            (reference.collection, reference.field_ids)
        };

        let mut changed = false;
        for field_id in &field_ids {
            let Some(options) = owner
                .field_by_id_mut(field_id)
                .and_then(|f| f.relation_options_mut())
            else {
                continue;
            };

            let updated =
                rewrite_display_fields(&options.display_fields, &delta.deleted_fields, &renamed);
            if updated != options.display_fields {
                options.display_fields = updated;
                changed = true;
            }
        }

        if !changed {
            continue;
        }

        debug!(
            collection = %owner.name,
            target = %collection.name,
            "Updating relation display fields"
        );
        store
            .save(conn, &owner)
            .await
            .map_err(|source| SyncError::ReferencePropagation {
                collection: owner.name.clone(),
                source: Box::new(source),
            })?;
        saved.push(owner.name);
    }

    Ok(saved)
}
