//! Typed migration operations and execution phases.
//!
//! Every schema change the planner can emit is one variant of
//! [`OperationKind`]; consumers match exhaustively, so adding a kind is a
//! compile-time-checked change everywhere it matters (the DDL compilers, the
//! drop resolver, the generator).

use serde::{Deserialize, Serialize};

use drift_schema::{ColumnSpec, IndexSpec, ModelSchema, PrimaryKeySpec, ReferentialAction, UniqueSpec};

use crate::graph::NodeId;
use crate::normalize::DefaultChange;

/// Coarse ordering bucket for operations.
///
/// The total order is the safety guarantee: nothing in a later phase ever
/// runs before anything in an earlier one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ExecutionPhase {
    /// New tables and columns.
    StructureCreation,
    /// Constraint and index reshuffling (drops before adds, to free names).
    ConstraintCreation,
    /// Drops and risky column modifications.
    Destructive,
}

/// A fully resolved foreign-key description, ready for DDL rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDef {
    /// Constraint name (explicit or derived).
    pub constraint_name: String,
    /// Referencing column on the owning table.
    pub column: String,
    /// Referenced table.
    pub referenced_table: String,
    /// Referenced column.
    pub referenced_column: String,
    /// ON DELETE action, if declared.
    pub on_delete: Option<ReferentialAction>,
    /// ON UPDATE action, if declared.
    pub on_update: Option<ReferentialAction>,
}

/// A single schema change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OperationKind {
    /// Create a table with all its columns inlined.
    CreateTable {
        /// The declared table, columns and per-column constraints included.
        model: ModelSchema,
    },
    /// Add one column to an existing table.
    AddColumn {
        /// Table name.
        table: String,
        /// Column declaration.
        column: ColumnSpec,
    },
    /// Create an index.
    CreateIndex {
        /// Table name.
        table: String,
        /// Index declaration.
        index: IndexSpec,
    },
    /// Add a primary key constraint.
    AddPrimaryKey {
        /// Table name.
        table: String,
        /// Key declaration.
        pk: PrimaryKeySpec,
    },
    /// Add a unique constraint.
    AddUniqueConstraint {
        /// Table name.
        table: String,
        /// Constraint declaration.
        unique: UniqueSpec,
    },
    /// Add a foreign key constraint.
    AddForeignKey {
        /// Owning table.
        table: String,
        /// Resolved key description.
        fk: ForeignKeyDef,
    },
    /// Drop a foreign key constraint.
    DropForeignKey {
        /// Owning table.
        table: String,
        /// Constraint name.
        constraint_name: String,
    },
    /// Drop a non-FK constraint (primary key or unique).
    DropConstraint {
        /// Owning table.
        table: String,
        /// Constraint name.
        constraint_name: String,
    },
    /// Drop a column.
    DropColumn {
        /// Table name.
        table: String,
        /// Column database name.
        column: String,
    },
    /// Drop an index.
    DropIndex {
        /// Table name.
        table: String,
        /// Index name.
        name: String,
    },
    /// Drop a table.
    DropTable {
        /// Table name.
        table: String,
    },
    /// Alter a column in place (type/nullability/default).
    ModifyColumn {
        /// Table name.
        table: String,
        /// Target column declaration (the desired end state).
        column: ColumnSpec,
        /// Default-value change direction, when the default drifted.
        default_change: Option<DefaultChange>,
    },
    /// Replace the primary key (drop the old constraint, add the new one).
    ModifyPrimaryKey {
        /// Table name.
        table: String,
        /// Desired key.
        pk: PrimaryKeySpec,
        /// Existing constraint to drop first, when the catalog names one.
        drop_existing: Option<String>,
    },
}

impl OperationKind {
    /// The table this operation targets.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { model } => &model.table,
            Self::AddColumn { table, .. }
            | Self::CreateIndex { table, .. }
            | Self::AddPrimaryKey { table, .. }
            | Self::AddUniqueConstraint { table, .. }
            | Self::AddForeignKey { table, .. }
            | Self::DropForeignKey { table, .. }
            | Self::DropConstraint { table, .. }
            | Self::DropColumn { table, .. }
            | Self::DropIndex { table, .. }
            | Self::DropTable { table }
            | Self::ModifyColumn { table, .. }
            | Self::ModifyPrimaryKey { table, .. } => table,
        }
    }

    /// A human-readable description for logs and dry runs.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::CreateTable { model } => format!("Create table '{}'", model.table),
            Self::AddColumn { table, column } => {
                format!("Add column '{}' to table '{table}'", column.db_name)
            }
            Self::CreateIndex { table, index } => {
                format!("Create index '{}' on table '{table}'", index.name)
            }
            Self::AddPrimaryKey { table, .. } => format!("Add primary key to table '{table}'"),
            Self::AddUniqueConstraint { table, unique } => {
                format!("Add unique constraint '{}' to table '{table}'", unique.name)
            }
            Self::AddForeignKey { table, fk } => format!(
                "Add foreign key '{}' to table '{table}'",
                fk.constraint_name
            ),
            Self::DropForeignKey {
                table,
                constraint_name,
            } => format!("Drop foreign key '{constraint_name}' from table '{table}'"),
            Self::DropConstraint {
                table,
                constraint_name,
            } => format!("Drop constraint '{constraint_name}' from table '{table}'"),
            Self::DropColumn { table, column } => {
                format!("Drop column '{column}' from table '{table}'")
            }
            Self::DropIndex { table, name } => {
                format!("Drop index '{name}' on table '{table}'")
            }
            Self::DropTable { table } => format!("Drop table '{table}'"),
            Self::ModifyColumn { table, column, .. } => {
                format!("Modify column '{}' on table '{table}'", column.db_name)
            }
            Self::ModifyPrimaryKey { table, .. } => {
                format!("Modify primary key on table '{table}'")
            }
        }
    }
}

/// One planned operation: a [`OperationKind`] placed in a phase, with its
/// drop-graph dependencies and the SQL the DDL compiler rendered for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationOperation {
    /// What to do.
    pub kind: OperationKind,
    /// When to do it.
    pub phase: ExecutionPhase,
    /// Drop-graph nodes this operation depends on (destructive phase only).
    pub dependencies: Vec<NodeId>,
    /// Dialect-rendered SQL, in execution order.
    pub sql_statements: Vec<String>,
}

impl MigrationOperation {
    /// Creates an operation in the given phase, SQL not yet rendered.
    #[must_use]
    pub const fn new(kind: OperationKind, phase: ExecutionPhase) -> Self {
        Self {
            kind,
            phase,
            dependencies: Vec::new(),
            sql_statements: Vec::new(),
        }
    }

    /// Attaches drop-graph dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Vec<NodeId>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_schema::ColumnType;

    #[test]
    fn test_phase_total_order() {
        assert!(ExecutionPhase::StructureCreation < ExecutionPhase::ConstraintCreation);
        assert!(ExecutionPhase::ConstraintCreation < ExecutionPhase::Destructive);
    }

    #[test]
    fn test_operation_table() {
        let op = OperationKind::AddColumn {
            table: "posts".to_string(),
            column: ColumnSpec::new("views", ColumnType::Integer),
        };
        assert_eq!(op.table(), "posts");

        let op = OperationKind::CreateTable {
            model: ModelSchema::new("users"),
        };
        assert_eq!(op.table(), "users");
    }

    #[test]
    fn test_descriptions() {
        let op = OperationKind::DropForeignKey {
            table: "posts".to_string(),
            constraint_name: "fk_posts_author_id_users".to_string(),
        };
        assert_eq!(
            op.description(),
            "Drop foreign key 'fk_posts_author_id_users' from table 'posts'"
        );
    }
}
