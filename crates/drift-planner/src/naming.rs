//! Deterministic constraint and index naming.
//!
//! An explicit model-provided name always wins. Otherwise the name is a
//! pure function of the objects involved, so regenerating a plan against an
//! unchanged schema derives the same names every time — the precondition for
//! idempotent diffs.

use drift_schema::RelationSpec;

/// Constraint name for a foreign key: explicit name, or
/// `fk_<table>_<column>_<referenced_table>`.
#[must_use]
pub fn fk_constraint_name(table: &str, relation: &RelationSpec) -> String {
    relation.constraint_name.clone().unwrap_or_else(|| {
        format!(
            "fk_{table}_{}_{}",
            relation.source_column, relation.target_table
        )
    })
}

/// Default name for a unique constraint: `uq_<table>_<col>[_<col>…]`.
#[must_use]
pub fn unique_constraint_name(table: &str, columns: &[String]) -> String {
    format!("uq_{table}_{}", columns.join("_"))
}

/// Default name for an index: `idx_<table>_<col>[_<col>…]`.
#[must_use]
pub fn index_name(table: &str, columns: &[String]) -> String {
    format!("idx_{table}_{}", columns.join("_"))
}

/// Default name for a primary key constraint: `pk_<table>`.
#[must_use]
pub fn pk_constraint_name(table: &str) -> String {
    format!("pk_{table}")
}
