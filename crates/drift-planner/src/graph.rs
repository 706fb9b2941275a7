//! Drop-order resolution.
//!
//! Destructive operations are sequenced over a dependency graph so that no
//! DROP ever references an object already removed: foreign keys first, then
//! constraints tied to dropped columns, then columns, then tables, each
//! class internally in topological order.
//!
//! A cycle in the graph is fatal. The sort never returns a partial order; a
//! truncated drop sequence applied to a live database is exactly the failure
//! mode this module exists to prevent.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::diff::{DiffResult, UniqueDrop};
use crate::error::{PlanError, Result};
use crate::naming;
use crate::ops::{ExecutionPhase, MigrationOperation, OperationKind};

/// Identity of a droppable object, for dependency tracking.
///
/// Nodes live for one plan cycle only and are never reused across kinds.
/// The `Display` form (`table.users`, `fk.posts.fk_posts_author_id_users`,
/// …) exists for messages and logs; the graph itself works on the typed
/// values.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeId {
    /// A whole table.
    Table {
        /// Table name.
        table: String,
    },
    /// A column.
    Column {
        /// Owning table.
        table: String,
        /// Column database name.
        column: String,
    },
    /// A foreign-key constraint.
    ForeignKey {
        /// Owning table.
        table: String,
        /// Constraint name.
        constraint: String,
    },
    /// A table's primary key.
    PrimaryKey {
        /// Owning table.
        table: String,
    },
    /// A unique constraint.
    Unique {
        /// Owning table.
        table: String,
        /// Constraint name.
        name: String,
    },
}

impl NodeId {
    /// Table node.
    #[must_use]
    pub fn table(table: impl Into<String>) -> Self {
        Self::Table {
            table: table.into(),
        }
    }

    /// Column node.
    #[must_use]
    pub fn column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::Column {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Foreign-key node.
    #[must_use]
    pub fn foreign_key(table: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self::ForeignKey {
            table: table.into(),
            constraint: constraint.into(),
        }
    }

    /// Primary-key node.
    #[must_use]
    pub fn primary_key(table: impl Into<String>) -> Self {
        Self::PrimaryKey {
            table: table.into(),
        }
    }

    /// Unique-constraint node.
    #[must_use]
    pub fn unique(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Unique {
            table: table.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table { table } => write!(f, "table.{table}"),
            Self::Column { table, column } => write!(f, "column.{table}.{column}"),
            Self::ForeignKey { table, constraint } => write!(f, "fk.{table}.{constraint}"),
            Self::PrimaryKey { table } => write!(f, "pk.{table}"),
            Self::Unique { table, name } => write!(f, "unique.{table}.{name}"),
        }
    }
}

/// Dependency maps for everything slated for removal, grouped by class.
///
/// An edge `a -> b` means "`a` must be dropped before `b`". Edges only point
/// at nodes that are themselves in the drop set; objects that survive the
/// migration constrain nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropDependencies {
    /// Foreign-key nodes and their dependencies.
    pub foreign_keys: BTreeMap<NodeId, Vec<NodeId>>,
    /// Primary-key/unique constraint nodes and their dependencies.
    pub constraints: BTreeMap<NodeId, Vec<NodeId>>,
    /// Column nodes and their dependencies.
    pub columns: BTreeMap<NodeId, Vec<NodeId>>,
    /// Table nodes and their dependencies.
    pub tables: BTreeMap<NodeId, Vec<NodeId>>,
}

impl DropDependencies {
    /// All nodes and edges as one map, for sorting.
    #[must_use]
    pub fn combined(&self) -> BTreeMap<NodeId, Vec<NodeId>> {
        let mut combined = BTreeMap::new();
        for map in [&self.foreign_keys, &self.constraints, &self.columns, &self.tables] {
            for (node, deps) in map {
                combined.insert(node.clone(), deps.clone());
            }
        }
        combined
    }
}

/// Whether a stale unique constraint is tied to a column being dropped.
///
/// Tied uniques must be sequenced by the drop resolver (before their
/// columns); untied ones are rename churn handled in the constraint phase.
#[must_use]
pub fn unique_tied_to_dropped_column(diff: &DiffResult, unique: &UniqueDrop) -> bool {
    diff.columns_to_drop
        .iter()
        .any(|d| d.table == unique.table && unique.columns.contains(&d.column))
}

/// Builds the drop-dependency maps for everything the diff removes.
#[must_use]
pub fn build_drop_dependencies(diff: &DiffResult) -> DropDependencies {
    let mut deps = DropDependencies::default();

    let dropped_tables: HashSet<&str> =
        diff.tables_to_drop.iter().map(|t| t.table.as_str()).collect();
    let dropped_columns: HashSet<(&str, &str)> = diff
        .columns_to_drop
        .iter()
        .map(|c| (c.table.as_str(), c.column.as_str()))
        .collect();
    let dropped_pks: HashSet<&str> = diff
        .primary_keys_to_drop
        .iter()
        .map(|p| p.table.as_str())
        .collect();

    let mut fk_edges = |table: &str, constraint: &str, column: &str, referenced: &str| {
        let mut edges = Vec::new();
        if dropped_tables.contains(referenced) {
            edges.push(NodeId::table(referenced));
        }
        if dropped_tables.contains(table) {
            edges.push(NodeId::table(table));
        }
        if dropped_columns.contains(&(table, column)) {
            edges.push(NodeId::column(table, column));
        }
        if dropped_pks.contains(referenced) {
            edges.push(NodeId::primary_key(referenced));
        }
        deps.foreign_keys
            .insert(NodeId::foreign_key(table, constraint), edges);
    };

    for drop in &diff.relations_to_drop {
        fk_edges(
            &drop.table,
            &drop.fk.constraint_name,
            &drop.fk.column,
            &drop.fk.referenced_table,
        );
    }
    for table_drop in &diff.tables_to_drop {
        for fk in &table_drop.foreign_keys {
            fk_edges(
                &table_drop.table,
                &fk.constraint_name,
                &fk.column,
                &fk.referenced_table,
            );
        }
    }

    for pk_drop in &diff.primary_keys_to_drop {
        let table = pk_drop.table.as_str();
        let mut edges = Vec::new();
        for column in &pk_drop.pk.columns {
            if dropped_columns.contains(&(table, column.as_str())) {
                edges.push(NodeId::column(table, column.clone()));
            }
        }
        if dropped_tables.contains(table) {
            edges.push(NodeId::table(table));
        }
        deps.constraints.insert(NodeId::primary_key(table), edges);
    }

    for unique in &diff.uniques_to_drop {
        if !unique_tied_to_dropped_column(diff, unique) {
            continue;
        }
        let table = unique.table.as_str();
        let mut edges = Vec::new();
        for column in &unique.columns {
            if dropped_columns.contains(&(table, column.as_str())) {
                edges.push(NodeId::column(table, column.clone()));
            }
        }
        if dropped_tables.contains(table) {
            edges.push(NodeId::table(table));
        }
        deps.constraints
            .insert(NodeId::unique(table, unique.name.clone()), edges);
    }

    for column_drop in &diff.columns_to_drop {
        let table = column_drop.table.as_str();
        let mut edges = Vec::new();
        if dropped_tables.contains(table) {
            edges.push(NodeId::table(table));
        }
        deps.columns
            .insert(NodeId::column(table, column_drop.column.clone()), edges);
    }

    for table_drop in &diff.tables_to_drop {
        deps.tables
            .insert(NodeId::table(table_drop.table.clone()), Vec::new());
    }

    deps
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Temporary,
    Permanent,
}

/// Topologically sorts the graph so dependents come before their
/// dependencies (drop order).
///
/// Depth-first with temporary/permanent marking. Node iteration is over a
/// `BTreeMap`, so the result is deterministic for a given graph.
///
/// # Errors
///
/// Returns [`PlanError::CircularDependency`] naming a node on the cycle; no
/// partial order is returned.
pub fn topological_sort_reverse(graph: &BTreeMap<NodeId, Vec<NodeId>>) -> Result<Vec<NodeId>> {
    fn visit(
        node: &NodeId,
        graph: &BTreeMap<NodeId, Vec<NodeId>>,
        marks: &mut HashMap<NodeId, Mark>,
        out: &mut Vec<NodeId>,
    ) -> Result<()> {
        match marks.get(node) {
            Some(Mark::Permanent) => return Ok(()),
            Some(Mark::Temporary) => {
                return Err(PlanError::CircularDependency(node.clone()));
            }
            None => {}
        }

        marks.insert(node.clone(), Mark::Temporary);
        if let Some(deps) = graph.get(node) {
            for dep in deps {
                visit(dep, graph, marks, out)?;
            }
        }
        marks.insert(node.clone(), Mark::Permanent);
        out.push(node.clone());
        Ok(())
    }

    let mut marks = HashMap::new();
    let mut out = Vec::with_capacity(graph.len());
    for node in graph.keys() {
        visit(node, graph, &mut marks, &mut out)?;
    }

    // Post-order lists dependencies first; drop order is the reverse.
    out.reverse();
    Ok(out)
}

/// Generates the destructive-phase operations in a safe order.
///
/// # Errors
///
/// Fails on a cyclic drop graph; no operations are returned in that case.
pub fn generate_drop_operations(diff: &DiffResult) -> Result<Vec<MigrationOperation>> {
    let deps = build_drop_dependencies(diff);
    let combined = deps.combined();
    let order = topological_sort_reverse(&combined)?;

    let position: HashMap<&NodeId, usize> =
        order.iter().enumerate().map(|(i, n)| (n, i)).collect();
    let sorted = |map: &BTreeMap<NodeId, Vec<NodeId>>| -> Vec<(NodeId, Vec<NodeId>)> {
        let mut nodes: Vec<_> = map.iter().map(|(n, d)| (n.clone(), d.clone())).collect();
        nodes.sort_by_key(|(n, _)| position.get(n).copied().unwrap_or(usize::MAX));
        nodes
    };

    let mut operations = Vec::new();

    for (node, node_deps) in sorted(&deps.foreign_keys) {
        let NodeId::ForeignKey { table, constraint } = &node else {
            continue;
        };
        operations.push(
            MigrationOperation::new(
                OperationKind::DropForeignKey {
                    table: table.clone(),
                    constraint_name: constraint.clone(),
                },
                ExecutionPhase::Destructive,
            )
            .with_dependencies(node_deps),
        );
    }

    for (node, node_deps) in sorted(&deps.constraints) {
        let kind = match &node {
            NodeId::PrimaryKey { table } => {
                let name = diff
                    .primary_keys_to_drop
                    .iter()
                    .find(|p| &p.table == table)
                    .and_then(|p| p.pk.constraint_name.clone())
                    .unwrap_or_else(|| naming::pk_constraint_name(table));
                OperationKind::DropConstraint {
                    table: table.clone(),
                    constraint_name: name,
                }
            }
            NodeId::Unique { table, name } => OperationKind::DropConstraint {
                table: table.clone(),
                constraint_name: name.clone(),
            },
            _ => continue,
        };
        operations.push(
            MigrationOperation::new(kind, ExecutionPhase::Destructive).with_dependencies(node_deps),
        );
    }

    for (node, node_deps) in sorted(&deps.columns) {
        let NodeId::Column { table, column } = &node else {
            continue;
        };
        operations.push(
            MigrationOperation::new(
                OperationKind::DropColumn {
                    table: table.clone(),
                    column: column.clone(),
                },
                ExecutionPhase::Destructive,
            )
            .with_dependencies(node_deps),
        );
    }

    for (node, node_deps) in sorted(&deps.tables) {
        let NodeId::Table { table } = &node else {
            continue;
        };
        operations.push(
            MigrationOperation::new(
                OperationKind::DropTable {
                    table: table.clone(),
                },
                ExecutionPhase::Destructive,
            )
            .with_dependencies(node_deps),
        );
    }

    Ok(operations)
}

/// Advisory: flags additions that reference objects this plan removes.
/// Diagnostics only; never alters ordering.
pub fn analyze_constraint_impact(diff: &DiffResult) -> Vec<String> {
    let mut findings = Vec::new();

    let dropped_tables: HashSet<&str> =
        diff.tables_to_drop.iter().map(|t| t.table.as_str()).collect();
    for add in &diff.relations_to_add {
        if dropped_tables.contains(add.fk.referenced_table.as_str()) {
            findings.push(format!(
                "foreign key '{}' on '{}' references table '{}' which this plan drops",
                add.fk.constraint_name, add.table, add.fk.referenced_table
            ));
        }
        if diff
            .columns_to_drop
            .iter()
            .any(|d| d.table == add.table && d.column == add.fk.column)
        {
            findings.push(format!(
                "foreign key '{}' on '{}' uses column '{}' which this plan drops",
                add.fk.constraint_name, add.table, add.fk.column
            ));
        }
    }

    for finding in &findings {
        warn!(%finding, "constraint impact");
    }
    findings
}

/// Advisory: tables touched by both creative and destructive operations in
/// one plan. Diagnostics only.
pub fn detect_mixed_operations(diff: &DiffResult) -> Vec<String> {
    let mut creating: HashSet<&str> = HashSet::new();
    creating.extend(diff.tables_to_add.iter().map(|m| m.table.as_str()));
    creating.extend(diff.columns_to_add.iter().map(|c| c.table.as_str()));
    creating.extend(diff.relations_to_add.iter().map(|r| r.table.as_str()));
    creating.extend(diff.uniques_to_add.iter().map(|u| u.table.as_str()));
    creating.extend(diff.indexes_to_add.iter().map(|i| i.table.as_str()));

    let mut destroying: HashSet<&str> = HashSet::new();
    destroying.extend(diff.tables_to_drop.iter().map(|t| t.table.as_str()));
    destroying.extend(diff.columns_to_drop.iter().map(|c| c.table.as_str()));
    destroying.extend(diff.relations_to_drop.iter().map(|r| r.table.as_str()));

    let mut mixed: Vec<String> = creating
        .intersection(&destroying)
        .map(|t| (*t).to_string())
        .collect();
    mixed.sort_unstable();

    for table in &mixed {
        warn!(table = %table, "plan mixes creative and destructive operations on one table");
    }
    mixed
}
