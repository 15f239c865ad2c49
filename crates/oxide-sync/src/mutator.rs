//! Table mutator.
//!
//! Translates a collection (creation) or a [`SchemaDelta`] (update) into the
//! ordered DDL operations for the record table.
//!
//! Added and renamed columns are first written under a temporary name and only
//! renamed to their final name in a second pass. This way a schema that reuses
//! a name currently held by another field (e.g. `name, title -> title, name`)
//! never has two columns claiming the same name at any intermediate step.

use rand::distr::{Alphanumeric, SampleString};

use oxide_collections::{
    Collection, FIELD_NAME_CREATED, FIELD_NAME_EMAIL, FIELD_NAME_EMAIL_VISIBILITY, FIELD_NAME_ID,
    FIELD_NAME_LAST_RESET_SENT_AT, FIELD_NAME_LAST_VERIFICATION_SENT_AT, FIELD_NAME_PASSWORD_HASH,
    FIELD_NAME_TOKEN_KEY, FIELD_NAME_UPDATED, FIELD_NAME_USERNAME, FIELD_NAME_VERIFIED,
};

use crate::diff::SchemaDelta;
use crate::index::IndexDescriptor;
use crate::operations::{ColumnSpec, TableOperation};
use crate::plan::{PlannedStep, SyncStep};

/// Length of the random suffix appended to temporary column names.
pub const TEMP_SUFFIX_LEN: usize = 5;

const ID_COLUMN: &str = "TEXT PRIMARY KEY DEFAULT ('r'||lower(hex(randomblob(7)))) NOT NULL";
const TIMESTAMP_COLUMN: &str = "TEXT DEFAULT (strftime('%Y-%m-%d %H:%M:%fZ')) NOT NULL";
const AUTH_COLUMNS: [(&str, &str); 8] = [
    (FIELD_NAME_USERNAME, "TEXT NOT NULL"),
    (FIELD_NAME_EMAIL, "TEXT DEFAULT '' NOT NULL"),
    (FIELD_NAME_EMAIL_VISIBILITY, "BOOLEAN DEFAULT FALSE NOT NULL"),
    (FIELD_NAME_VERIFIED, "BOOLEAN DEFAULT FALSE NOT NULL"),
    (FIELD_NAME_TOKEN_KEY, "TEXT NOT NULL"),
    (FIELD_NAME_PASSWORD_HASH, "TEXT NOT NULL"),
    (FIELD_NAME_LAST_RESET_SENT_AT, "TEXT DEFAULT '' NOT NULL"),
    (FIELD_NAME_LAST_VERIFICATION_SENT_AT, "TEXT DEFAULT '' NOT NULL"),
];

/// Returns `base` followed by a random lowercase alphanumeric suffix.
#[must_use]
pub fn temp_column_name(base: &str) -> String {
    let suffix = Alphanumeric
        .sample_string(&mut rand::rng(), TEMP_SUFFIX_LEN)
        .to_lowercase();
    format!("{base}{suffix}")
}

/// Plans DDL for record tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableMutator;

impl TableMutator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Plans the creation of the record table of `collection`: the system
    /// columns, one column per field and, for auth collections, the unique
    /// indexes on `username`, `tokenKey` and non-empty `email`.
    #[must_use]
    pub fn create_table(&self, collection: &Collection) -> Vec<TableOperation> {
        if collection.is_view() {
            return Vec::new();
        }

        let mut columns = vec![
            ColumnSpec::new(FIELD_NAME_ID, ID_COLUMN),
            ColumnSpec::new(FIELD_NAME_CREATED, TIMESTAMP_COLUMN),
            ColumnSpec::new(FIELD_NAME_UPDATED, TIMESTAMP_COLUMN),
        ];
        if collection.is_auth() {
            columns.extend(
                AUTH_COLUMNS
                    .iter()
                    .map(|(name, definition)| ColumnSpec::new(*name, *definition)),
            );
        }
        columns.extend(
            collection
                .fields
                .iter()
                .map(|f| ColumnSpec::new(&f.name, f.column_definition())),
        );

        let mut operations = vec![TableOperation::CreateTable {
            name: collection.name.clone(),
            columns,
        }];

        if collection.is_auth() {
            let table = &collection.name;
            let id = &collection.id;
            let system_indexes = [
                IndexDescriptor::new(format!("_{id}_username_idx"), table, &[FIELD_NAME_USERNAME])
                    .unique(),
                IndexDescriptor::new(format!("_{id}_email_idx"), table, &[FIELD_NAME_EMAIL])
                    .unique()
                    .condition(format!("\"{FIELD_NAME_EMAIL}\" != ''")),
                IndexDescriptor::new(format!("_{id}_tokenKey_idx"), table, &[FIELD_NAME_TOKEN_KEY])
                    .unique(),
            ];
            operations.extend(
                system_indexes
                    .into_iter()
                    .map(|index| TableOperation::CreateIndex {
                        position: None,
                        index,
                    }),
            );
        }

        operations
    }

    /// Plans the column and table changes of `delta`, grouped by step.
    ///
    /// Index rebuilding is planned separately with [`build_indexes`]
    /// because it runs after the value normalization.
    #[must_use]
    pub fn apply_delta(
        &self,
        new: &Collection,
        old: &Collection,
        delta: &SchemaDelta,
    ) -> Vec<PlannedStep> {
        if new.is_view() {
            return Vec::new();
        }

        let table = new.name.as_str();
        let mut steps = vec![PlannedStep::new(SyncStep::DropOldIndexes, drop_indexes(old))];

        if let Some(rename) = &delta.table_rename {
            steps.push(PlannedStep::new(
                SyncStep::RenameTable,
                vec![TableOperation::rename_table(&rename.from, &rename.to)],
            ));
        }

        steps.push(PlannedStep::new(
            SyncStep::DropDeletedColumns,
            delta
                .deleted_fields
                .iter()
                .map(|name| TableOperation::drop_column(table, name))
                .collect(),
        ));

        let mut staged = Vec::new();
        let mut finalized = Vec::new();
        for field in &new.fields {
            let temp_name = temp_column_name(&field.name);

            if let Some(rename) = delta.rename_of(&field.id) {
                staged.push(TableOperation::rename_column(table, &rename.from, &temp_name));
            } else if delta.added_fields.iter().any(|f| f.id == field.id) {
                staged.push(TableOperation::add_column(
                    table,
                    &temp_name,
                    field.column_definition(),
                ));
            } else {
                continue;
            }

            finalized.push(TableOperation::rename_column(table, temp_name, &field.name));
        }

        steps.push(PlannedStep::new(SyncStep::AddOrRenameColumns, staged));
        steps.push(PlannedStep::new(SyncStep::FinalizeRenames, finalized));

        steps
    }
}

/// Plans `DROP INDEX IF EXISTS` for every valid index of `collection`.
#[must_use]
pub fn drop_indexes(collection: &Collection) -> Vec<TableOperation> {
    if collection.is_view() {
        return Vec::new();
    }

    collection
        .indexes
        .iter()
        .map(|raw| IndexDescriptor::parse(raw))
        .filter(IndexDescriptor::is_valid)
        .map(|index| TableOperation::drop_index(index.index_name))
        .collect()
}
