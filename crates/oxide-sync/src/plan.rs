//! Sync plans.
//!
//! A [`SyncPlan`] is the full, ordered list of operations a sync will run,
//! grouped by the step of the sync state machine that owns them:
//!
//! ```text
//! Creating: CreateTable → BuildIndexes
//! Updating: DropOldIndexes → RenameTable? → DropDeletedColumns →
//!           AddOrRenameColumns → FinalizeRenames → NormalizeCardinality →
//!           PropagateRelationRenames → RebuildIndexes
//! ```
//!
//! Planning never touches the database, which makes it usable for dry runs.

use std::fmt;

use oxide_collections::Collection;

use crate::dialect::SyncDialect;
use crate::diff::SchemaDelta;
use crate::error::{Result, ValidationErrors};
use crate::index::build_indexes;
use crate::mutator::TableMutator;
use crate::normalize::normalize_cardinality;
use crate::operations::TableOperation;

/// Whether the sync creates or updates the record table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// No previous schema.
    Creating,
    /// A previous schema exists.
    Updating,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Creating => f.write_str("creating"),
            Self::Updating => f.write_str("updating"),
        }
    }
}

/// A step of the sync state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    CreateTable,
    BuildIndexes,
    DropOldIndexes,
    RenameTable,
    DropDeletedColumns,
    AddOrRenameColumns,
    FinalizeRenames,
    NormalizeCardinality,
    /// Updates other collections' metadata; has no table operations.
    PropagateRelationRenames,
    RebuildIndexes,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateTable => "create_table",
            Self::BuildIndexes => "build_indexes",
            Self::DropOldIndexes => "drop_old_indexes",
            Self::RenameTable => "rename_table",
            Self::DropDeletedColumns => "drop_deleted_columns",
            Self::AddOrRenameColumns => "add_or_rename_columns",
            Self::FinalizeRenames => "finalize_renames",
            Self::NormalizeCardinality => "normalize_cardinality",
            Self::PropagateRelationRenames => "propagate_relation_renames",
            Self::RebuildIndexes => "rebuild_indexes",
        };
        f.write_str(name)
    }
}

/// The operations of one step.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStep {
    pub step: SyncStep,
    pub operations: Vec<TableOperation>,
}

impl PlannedStep {
    /// Creates a planned step.
    #[must_use]
    pub fn new(step: SyncStep, operations: Vec<TableOperation>) -> Self {
        Self { step, operations }
    }
}

/// Everything a sync of one collection will do.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub mode: SyncMode,
    /// Name of the synced collection (the new table name).
    pub collection: String,
    pub delta: SchemaDelta,
    pub steps: Vec<PlannedStep>,
    /// Index expressions rejected while planning, keyed by position.
    pub index_errors: ValidationErrors,
}

impl SyncPlan {
    /// Plans the sync of `new` against its previous version `old`.
    ///
    /// Fails if `new` breaks a schema invariant.
    pub fn build(new: &Collection, old: Option<&Collection>) -> Result<Self> {
        new.validate()?;

        let mutator = TableMutator::new();
        let delta = SchemaDelta::between(new, old);
        let (index_operations, index_errors) = build_indexes(new);

        let (mode, steps) = match old {
            None => (
                SyncMode::Creating,
                vec![
                    PlannedStep::new(SyncStep::CreateTable, mutator.create_table(new)),
                    PlannedStep::new(SyncStep::BuildIndexes, index_operations),
                ],
            ),
            Some(old) => {
                let mut steps = mutator.apply_delta(new, old, &delta);
                steps.push(PlannedStep::new(
                    SyncStep::NormalizeCardinality,
                    normalize_cardinality(new, &delta),
                ));
                steps.push(PlannedStep::new(SyncStep::PropagateRelationRenames, Vec::new()));
                steps.push(PlannedStep::new(SyncStep::RebuildIndexes, index_operations));
                (SyncMode::Updating, steps)
            }
        };

        Ok(Self {
            mode,
            collection: new.name.clone(),
            delta,
            steps,
            index_errors,
        })
    }

    /// Returns every planned operation in execution order.
    pub fn operations(&self) -> impl Iterator<Item = &TableOperation> {
        self.steps.iter().flat_map(|s| s.operations.iter())
    }

    /// Returns the operations of `step`.
    #[must_use]
    pub fn step(&self, step: SyncStep) -> &[TableOperation] {
        self.steps
            .iter()
            .find(|s| s.step == step)
            .map(|s| s.operations.as_slice())
            .unwrap_or_default()
    }

    /// Renders the plan as SQL statements.
    #[must_use]
    pub fn statements<D: SyncDialect>(&self, dialect: &D) -> Vec<String> {
        self.operations()
            .flat_map(|op| dialect.generate_sql(op))
            .collect()
    }
}
