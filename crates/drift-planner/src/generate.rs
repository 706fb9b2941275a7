//! Turns a [`DiffResult`] into phase-ordered migration operations.
//!
//! Emission order inside each phase is part of the contract:
//!
//! - structure creation: table creates, then column adds;
//! - constraint creation: stale unique drops, stale index drops, primary
//!   keys, foreign keys, unique constraints, new indexes (drops precede
//!   adds so a rename can reuse its name);
//! - destructive: resolver-ordered drops, in-place foreign-key
//!   redefinitions, column modifications last.
//!
//! A foreign key added and dropped under the same `table::constraint` key
//! in one plan is churn and both sides are removed. Redefinitions coming
//! from the relation-modify bucket are exempt; their drop and add refer to
//! the same name on purpose.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::diff::DiffResult;
use crate::dialect::DdlCompiler;
use crate::error::Result;
use crate::graph;
use crate::ops::{ExecutionPhase, MigrationOperation, OperationKind};

/// Generates operations from a diff and renders their SQL.
pub struct OperationGenerator<'a> {
    ddl: &'a dyn DdlCompiler,
}

impl<'a> OperationGenerator<'a> {
    /// Creates a generator rendering SQL through the given compiler.
    #[must_use]
    pub const fn new(ddl: &'a dyn DdlCompiler) -> Self {
        Self { ddl }
    }

    /// Generates the full phase-ordered operation list for a diff.
    ///
    /// # Errors
    ///
    /// Fails on a cyclic drop graph or when the DDL compiler cannot render
    /// an operation; no partial plan is returned.
    pub fn generate(&self, diff: &DiffResult) -> Result<Vec<MigrationOperation>> {
        let mut operations = Vec::new();
        self.structure_creation(diff, &mut operations);
        self.constraint_creation(diff, &mut operations);
        operations.extend(graph::generate_drop_operations(diff)?);

        let mut operations = cancel_foreign_key_churn(operations);
        self.relation_redefinitions(diff, &mut operations);
        self.column_modifications(diff, &mut operations);

        for op in &mut operations {
            op.sql_statements = self.ddl.statements(&op.kind)?;
        }

        debug!(
            dialect = self.ddl.name(),
            operations = operations.len(),
            "generated migration operations"
        );
        Ok(operations)
    }

    fn structure_creation(&self, diff: &DiffResult, out: &mut Vec<MigrationOperation>) {
        for model in &diff.tables_to_add {
            out.push(MigrationOperation::new(
                OperationKind::CreateTable {
                    model: model.clone(),
                },
                ExecutionPhase::StructureCreation,
            ));
        }
        for add in &diff.columns_to_add {
            out.push(MigrationOperation::new(
                OperationKind::AddColumn {
                    table: add.table.clone(),
                    column: add.column.clone(),
                },
                ExecutionPhase::StructureCreation,
            ));
        }
    }

    fn constraint_creation(&self, diff: &DiffResult, out: &mut Vec<MigrationOperation>) {
        // Stale uniques whose columns survive; column-tied ones belong to
        // the drop resolver.
        let mut unique_drop_names: HashSet<(&str, &str)> = HashSet::new();
        for drop in &diff.uniques_to_drop {
            unique_drop_names.insert((drop.table.as_str(), drop.name.as_str()));
            if graph::unique_tied_to_dropped_column(diff, drop) {
                continue;
            }
            out.push(MigrationOperation::new(
                OperationKind::DropConstraint {
                    table: drop.table.clone(),
                    constraint_name: drop.name.clone(),
                },
                ExecutionPhase::ConstraintCreation,
            ));
        }

        // A unique drop already removes its backing index.
        for drop in &diff.indexes_to_drop {
            if unique_drop_names.contains(&(drop.table.as_str(), drop.name.as_str())) {
                continue;
            }
            out.push(MigrationOperation::new(
                OperationKind::DropIndex {
                    table: drop.table.clone(),
                    name: drop.name.clone(),
                },
                ExecutionPhase::ConstraintCreation,
            ));
        }

        for add in &diff.primary_keys_to_add {
            out.push(MigrationOperation::new(
                OperationKind::AddPrimaryKey {
                    table: add.table.clone(),
                    pk: add.pk.clone(),
                },
                ExecutionPhase::ConstraintCreation,
            ));
        }
        for modify in &diff.primary_keys_to_modify {
            out.push(MigrationOperation::new(
                OperationKind::ModifyPrimaryKey {
                    table: modify.table.clone(),
                    pk: modify.pk.clone(),
                    drop_existing: modify.existing.constraint_name.clone(),
                },
                ExecutionPhase::ConstraintCreation,
            ));
        }

        for add in &diff.relations_to_add {
            out.push(MigrationOperation::new(
                OperationKind::AddForeignKey {
                    table: add.table.clone(),
                    fk: add.fk.clone(),
                },
                ExecutionPhase::ConstraintCreation,
            ));
        }

        for add in &diff.uniques_to_add {
            out.push(MigrationOperation::new(
                OperationKind::AddUniqueConstraint {
                    table: add.table.clone(),
                    unique: add.unique.clone(),
                },
                ExecutionPhase::ConstraintCreation,
            ));
        }

        for add in &diff.indexes_to_add {
            out.push(MigrationOperation::new(
                OperationKind::CreateIndex {
                    table: add.table.clone(),
                    index: add.index.clone(),
                },
                ExecutionPhase::ConstraintCreation,
            ));
        }
    }

    /// In-place foreign-key redefinitions: same constraint name, changed
    /// referential actions. Emitted after churn cancellation so the pair
    /// survives intact.
    fn relation_redefinitions(&self, diff: &DiffResult, out: &mut Vec<MigrationOperation>) {
        for modify in &diff.relations_to_modify {
            out.push(MigrationOperation::new(
                OperationKind::DropForeignKey {
                    table: modify.table.clone(),
                    constraint_name: modify.existing.constraint_name.clone(),
                },
                ExecutionPhase::Destructive,
            ));
            out.push(MigrationOperation::new(
                OperationKind::AddForeignKey {
                    table: modify.table.clone(),
                    fk: modify.fk.clone(),
                },
                ExecutionPhase::Destructive,
            ));
        }
    }

    fn column_modifications(&self, diff: &DiffResult, out: &mut Vec<MigrationOperation>) {
        for modify in &diff.columns_to_modify {
            out.push(MigrationOperation::new(
                OperationKind::ModifyColumn {
                    table: modify.table.clone(),
                    column: modify.column.clone(),
                    default_change: modify.default_change,
                },
                ExecutionPhase::Destructive,
            ));
        }
    }
}

fn foreign_key_churn_key(kind: &OperationKind) -> Option<String> {
    match kind {
        OperationKind::AddForeignKey { table, fk } => {
            Some(format!("{table}::{}", fk.constraint_name))
        }
        OperationKind::DropForeignKey {
            table,
            constraint_name,
        } => Some(format!("{table}::{constraint_name}")),
        _ => None,
    }
}

/// Removes add/drop foreign-key pairs sharing one `table::constraint` key.
fn cancel_foreign_key_churn(operations: Vec<MigrationOperation>) -> Vec<MigrationOperation> {
    let mut adds = HashSet::new();
    let mut drops = HashSet::new();
    for op in &operations {
        match &op.kind {
            OperationKind::AddForeignKey { .. } => {
                if let Some(key) = foreign_key_churn_key(&op.kind) {
                    adds.insert(key);
                }
            }
            OperationKind::DropForeignKey { .. } => {
                if let Some(key) = foreign_key_churn_key(&op.kind) {
                    drops.insert(key);
                }
            }
            _ => {}
        }
    }

    let cancelled: HashSet<&String> = adds.intersection(&drops).collect();
    if cancelled.is_empty() {
        return operations;
    }
    for key in &cancelled {
        warn!(constraint = %key, "cancelling add/drop churn on foreign key");
    }

    operations
        .into_iter()
        .filter(|op| {
            foreign_key_churn_key(&op.kind).is_none_or(|key| !cancelled.contains(&key))
        })
        .collect()
}
