//! Schema diffing: desired models against introspected tables.
//!
//! [`SchemaDiff::make_diff`] fetches every model table's live schema
//! concurrently, diffs each table into a local [`DiffResult`], and merges
//! the locals in registry (lexicographic table-name) order. Output is
//! therefore deterministic regardless of introspection completion timing.

use std::collections::{HashMap, HashSet};
use std::future::Future;

use futures::future::try_join_all;
use tracing::{debug, warn};

use drift_schema::{
    ColumnSpec, Dialect, IndexSpec, ModelRegistry, ModelSchema, PrimaryKeySpec, RelationKind,
    RelationSpec, TableForeignKeyInfo, TablePrimaryKeyInfo, TableSchemaInfo, UniqueSpec,
};

use crate::error::Result;
use crate::naming;
use crate::normalize::{self, DefaultChange};
use crate::ops::ForeignKeyDef;

/// Read-only view of a live database's schema.
///
/// Implementations issue `information_schema`/`PRAGMA`/catalog queries; the
/// planner only ever reads through this seam. Errors propagate unchanged,
/// wrapped in [`crate::PlanError::Introspection`].
pub trait SchemaIntrospector {
    /// Returns the table's schema, or `None` when the table does not exist.
    fn table_schema(
        &self,
        table: &str,
    ) -> impl Future<Output = Result<Option<TableSchemaInfo>>> + Send;

    /// Lists every table name in the database.
    fn table_names(&self) -> impl Future<Output = Result<Vec<String>>> + Send;
}

/// Options governing a diff run.
#[derive(Debug, Clone, Copy)]
pub struct DiffOptions {
    /// Dialect the introspected schema was read from.
    pub dialect: Dialect,
    /// When set, introspected tables with no registered model are slated
    /// for removal.
    pub drop_unmanaged_tables: bool,
}

impl DiffOptions {
    /// Creates options for a dialect; unmanaged tables are kept.
    #[must_use]
    pub const fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            drop_unmanaged_tables: false,
        }
    }

    /// Slate introspected tables without a model for removal.
    #[must_use]
    pub const fn drop_unmanaged_tables(mut self) -> Self {
        self.drop_unmanaged_tables = true;
        self
    }
}

/// A whole table slated for removal, with the foreign keys the drop
/// resolver needs to sequence it safely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDrop {
    /// Table name.
    pub table: String,
    /// The table's own (outgoing) foreign keys.
    pub foreign_keys: Vec<TableForeignKeyInfo>,
}

/// A column to add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAdd {
    /// Owning table.
    pub table: String,
    /// Column declaration.
    pub column: ColumnSpec,
}

/// A column to drop, by database name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDrop {
    /// Owning table.
    pub table: String,
    /// Column database name.
    pub column: String,
}

/// A column whose definition drifted.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnModify {
    /// Owning table.
    pub table: String,
    /// Desired end state.
    pub column: ColumnSpec,
    /// Default-value change, when the default drifted.
    pub default_change: Option<DefaultChange>,
}

/// An index to add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexAdd {
    /// Owning table.
    pub table: String,
    /// Index declaration.
    pub index: IndexSpec,
}

/// An index to drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDrop {
    /// Owning table.
    pub table: String,
    /// Index name.
    pub name: String,
}

/// A unique constraint to add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueAdd {
    /// Owning table.
    pub table: String,
    /// Constraint declaration.
    pub unique: UniqueSpec,
}

/// A unique constraint (backing index) to drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueDrop {
    /// Owning table.
    pub table: String,
    /// Constraint name.
    pub name: String,
    /// Constrained columns, for drop-order dependency tracking.
    pub columns: Vec<String>,
}

/// A foreign key to add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationAdd {
    /// Owning table.
    pub table: String,
    /// Resolved key description.
    pub fk: ForeignKeyDef,
}

/// A foreign key to drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDrop {
    /// Owning table.
    pub table: String,
    /// The introspected key.
    pub fk: TableForeignKeyInfo,
}

/// A foreign key redefined in place: same name and target, changed
/// referential actions. Kept apart from add/drop churn so the change is
/// never cancelled away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationModify {
    /// Owning table.
    pub table: String,
    /// The introspected key to drop first.
    pub existing: TableForeignKeyInfo,
    /// The desired key.
    pub fk: ForeignKeyDef,
}

/// A primary key to add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKeyAdd {
    /// Owning table.
    pub table: String,
    /// Key declaration.
    pub pk: PrimaryKeySpec,
}

/// A primary key to drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKeyDrop {
    /// Owning table.
    pub table: String,
    /// The introspected key.
    pub pk: TablePrimaryKeyInfo,
}

/// A primary key whose columns or name drifted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKeyModify {
    /// Owning table.
    pub table: String,
    /// Desired key.
    pub pk: PrimaryKeySpec,
    /// The introspected key being replaced.
    pub existing: TablePrimaryKeyInfo,
}

/// Flat, append-only result of one diff run.
///
/// Buckets are mutually exclusive: a table in `tables_to_add` never has
/// column/index/unique-level entries of its own (everything rides inline on
/// the [`ModelSchema`]), and relation/index adds for a new table reference
/// its declarations directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffResult {
    /// Whole new tables, columns inlined.
    pub tables_to_add: Vec<ModelSchema>,
    /// Whole tables slated for removal.
    pub tables_to_drop: Vec<TableDrop>,
    /// Columns to add.
    pub columns_to_add: Vec<ColumnAdd>,
    /// Columns to drop.
    pub columns_to_drop: Vec<ColumnDrop>,
    /// Columns to modify.
    pub columns_to_modify: Vec<ColumnModify>,
    /// Indexes to add.
    pub indexes_to_add: Vec<IndexAdd>,
    /// Indexes to drop.
    pub indexes_to_drop: Vec<IndexDrop>,
    /// Unique constraints to add.
    pub uniques_to_add: Vec<UniqueAdd>,
    /// Unique constraints to drop.
    pub uniques_to_drop: Vec<UniqueDrop>,
    /// Foreign keys to add.
    pub relations_to_add: Vec<RelationAdd>,
    /// Foreign keys to drop.
    pub relations_to_drop: Vec<RelationDrop>,
    /// Foreign keys redefined in place.
    pub relations_to_modify: Vec<RelationModify>,
    /// Primary keys to add.
    pub primary_keys_to_add: Vec<PrimaryKeyAdd>,
    /// Primary keys to drop.
    pub primary_keys_to_drop: Vec<PrimaryKeyDrop>,
    /// Primary keys to modify.
    pub primary_keys_to_modify: Vec<PrimaryKeyModify>,
}

impl DiffResult {
    /// Creates an empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the run found no drift at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables_to_add.is_empty()
            && self.tables_to_drop.is_empty()
            && self.columns_to_add.is_empty()
            && self.columns_to_drop.is_empty()
            && self.columns_to_modify.is_empty()
            && self.indexes_to_add.is_empty()
            && self.indexes_to_drop.is_empty()
            && self.uniques_to_add.is_empty()
            && self.uniques_to_drop.is_empty()
            && self.relations_to_add.is_empty()
            && self.relations_to_drop.is_empty()
            && self.relations_to_modify.is_empty()
            && self.primary_keys_to_add.is_empty()
            && self.primary_keys_to_drop.is_empty()
            && self.primary_keys_to_modify.is_empty()
    }

    /// Appends every entry of `other`, preserving order.
    pub fn merge(&mut self, other: Self) {
        self.tables_to_add.extend(other.tables_to_add);
        self.tables_to_drop.extend(other.tables_to_drop);
        self.columns_to_add.extend(other.columns_to_add);
        self.columns_to_drop.extend(other.columns_to_drop);
        self.columns_to_modify.extend(other.columns_to_modify);
        self.indexes_to_add.extend(other.indexes_to_add);
        self.indexes_to_drop.extend(other.indexes_to_drop);
        self.uniques_to_add.extend(other.uniques_to_add);
        self.uniques_to_drop.extend(other.uniques_to_drop);
        self.relations_to_add.extend(other.relations_to_add);
        self.relations_to_drop.extend(other.relations_to_drop);
        self.relations_to_modify.extend(other.relations_to_modify);
        self.primary_keys_to_add.extend(other.primary_keys_to_add);
        self.primary_keys_to_drop.extend(other.primary_keys_to_drop);
        self.primary_keys_to_modify
            .extend(other.primary_keys_to_modify);
    }
}

/// Compares registered models against a live database.
#[derive(Debug)]
pub struct SchemaDiff<'a> {
    registry: &'a ModelRegistry,
    options: DiffOptions,
}

impl<'a> SchemaDiff<'a> {
    /// Creates a differ over the given registry.
    #[must_use]
    pub const fn new(registry: &'a ModelRegistry, options: DiffOptions) -> Self {
        Self { registry, options }
    }

    /// Computes the drift between the registered models and the database
    /// behind `introspector`.
    ///
    /// One introspection future is issued per model table and awaited
    /// together; each table's findings accumulate into a local result and
    /// the locals merge in registry order.
    ///
    /// # Errors
    ///
    /// Introspection and type-normalization errors abort the run; a failed
    /// diff yields no partial result.
    pub async fn make_diff<I: SchemaIntrospector + Sync>(
        &self,
        introspector: &I,
    ) -> Result<DiffResult> {
        let expected_fks = self.expected_foreign_keys();

        let locals = try_join_all(self.registry.models().iter().map(|model| {
            let expected = expected_fks.get(model.table.as_str());
            async move {
                let info = introspector.table_schema(&model.table).await?;
                debug!(table = %model.table, present = info.is_some(), "diffing table");
                self.diff_table(model, info.as_ref(), expected.map_or(&[], Vec::as_slice))
            }
        }))
        .await?;

        let mut diff = DiffResult::new();
        for local in locals {
            diff.merge(local);
        }

        if self.options.drop_unmanaged_tables {
            self.collect_unmanaged_drops(introspector, &mut diff).await?;
        }

        Ok(diff)
    }

    /// Resolves every declared relation into the foreign keys each table is
    /// expected to carry. Many-to-many relations materialize as a synthetic
    /// belongs-to owned by the through table.
    fn expected_foreign_keys(&self) -> HashMap<String, Vec<ExpectedForeignKey>> {
        let mut expected: HashMap<String, Vec<ExpectedForeignKey>> = HashMap::new();

        for model in self.registry.models() {
            for relation in &model.relations {
                let owner = match relation.kind {
                    RelationKind::BelongsTo => model.table.clone(),
                    RelationKind::ManyToMany => match &relation.through_table {
                        Some(through) => through.clone(),
                        None => {
                            warn!(
                                table = %model.table,
                                target = %relation.target_table,
                                "skipping many-to-many relation with no through table"
                            );
                            continue;
                        }
                    },
                };

                let Some(fk) = resolve_relation(&owner, relation) else {
                    warn!(
                        table = %owner,
                        target = %relation.target_table,
                        "skipping relation with no referenced column"
                    );
                    continue;
                };

                expected.entry(owner).or_default().push(fk);
            }
        }

        expected
    }

    /// Diffs one model table against its introspected counterpart.
    fn diff_table(
        &self,
        model: &ModelSchema,
        info: Option<&TableSchemaInfo>,
        expected_fks: &[ExpectedForeignKey],
    ) -> Result<DiffResult> {
        let mut diff = DiffResult::new();
        let table = model.table.as_str();
        let indexes = resolved_indexes(table, &model.indexes);
        let uniques = resolved_uniques(table, &model.uniques);

        let Some(info) = info else {
            // New table: everything rides inline; no column-level entries.
            diff.tables_to_add.push(model.clone());
            for index in indexes {
                diff.indexes_to_add.push(IndexAdd {
                    table: table.to_string(),
                    index,
                });
            }
            for unique in uniques {
                diff.uniques_to_add.push(UniqueAdd {
                    table: table.to_string(),
                    unique,
                });
            }
            for fk in expected_fks {
                diff.relations_to_add.push(RelationAdd {
                    table: table.to_string(),
                    fk: fk.def.clone(),
                });
            }
            return Ok(diff);
        };

        self.diff_columns(model, info, &mut diff)?;
        diff_indexes(table, &indexes, info, &mut diff);
        diff_uniques(table, &uniques, &indexes, info, &mut diff);
        diff_relations(table, expected_fks, info, &mut diff);
        diff_primary_key(model, info, &mut diff);

        Ok(diff)
    }

    /// Element-wise column comparison, by database name.
    fn diff_columns(
        &self,
        model: &ModelSchema,
        info: &TableSchemaInfo,
        diff: &mut DiffResult,
    ) -> Result<()> {
        let table = model.table.as_str();
        let dialect = self.options.dialect;

        let model_names: HashSet<&str> =
            model.columns.iter().map(|c| c.db_name.as_str()).collect();

        for column in &model.columns {
            match info.get_column(&column.db_name) {
                None => diff.columns_to_add.push(ColumnAdd {
                    table: table.to_string(),
                    column: column.clone(),
                }),
                Some(actual) => {
                    let equal = normalize::columns_equal(dialect, column, actual)?;
                    let default_change = normalize::default_change(dialect, column, actual);
                    if !equal || default_change.is_some() {
                        diff.columns_to_modify.push(ColumnModify {
                            table: table.to_string(),
                            column: column.clone(),
                            default_change,
                        });
                    }
                }
            }
        }

        for actual in &info.columns {
            if !model_names.contains(actual.name.as_str()) {
                diff.columns_to_drop.push(ColumnDrop {
                    table: table.to_string(),
                    column: actual.name.clone(),
                });
            }
        }

        Ok(())
    }

    /// Slates introspected tables with no registered model for removal.
    async fn collect_unmanaged_drops<I: SchemaIntrospector + Sync>(
        &self,
        introspector: &I,
        diff: &mut DiffResult,
    ) -> Result<()> {
        let mut unmanaged: Vec<String> = introspector
            .table_names()
            .await?
            .into_iter()
            .filter(|name| !self.registry.contains(name))
            .collect();
        unmanaged.sort_unstable();

        let infos = try_join_all(
            unmanaged
                .iter()
                .map(|table| introspector.table_schema(table)),
        )
        .await?;

        for (table, info) in unmanaged.into_iter().zip(infos) {
            let foreign_keys = info.map(|i| i.foreign_keys).unwrap_or_default();
            debug!(table = %table, "slating unmanaged table for removal");
            diff.tables_to_drop.push(TableDrop {
                table,
                foreign_keys,
            });
        }

        Ok(())
    }
}

/// A resolved foreign key plus whether its name came from the model.
///
/// When the model leaves the name out, `def.constraint_name` holds the
/// derived fallback and reconciliation matches the database by target
/// instead of by name.
#[derive(Debug, Clone)]
struct ExpectedForeignKey {
    def: ForeignKeyDef,
    name_declared: bool,
}

/// Builds the foreign key a relation implies on its owning table.
fn resolve_relation(owner: &str, relation: &RelationSpec) -> Option<ExpectedForeignKey> {
    let referenced_column = relation.target_columns.first()?.clone();
    Some(ExpectedForeignKey {
        def: ForeignKeyDef {
            constraint_name: naming::fk_constraint_name(owner, relation),
            column: relation.source_column.clone(),
            referenced_table: relation.target_table.clone(),
            referenced_column,
            on_delete: relation.on_delete,
            on_update: relation.on_update,
        },
        name_declared: relation.constraint_name.is_some(),
    })
}

/// Clones model index specs, deriving the default name for unnamed entries.
fn resolved_indexes(table: &str, indexes: &[IndexSpec]) -> Vec<IndexSpec> {
    indexes
        .iter()
        .map(|index| {
            let mut index = index.clone();
            if index.name.is_empty() {
                index.name = naming::index_name(table, &index.columns);
            }
            index
        })
        .collect()
}

/// Clones model unique specs, deriving the default name for unnamed entries.
fn resolved_uniques(table: &str, uniques: &[UniqueSpec]) -> Vec<UniqueSpec> {
    uniques
        .iter()
        .map(|unique| {
            let mut unique = unique.clone();
            if unique.name.is_empty() {
                unique.name = naming::unique_constraint_name(table, &unique.columns);
            }
            unique
        })
        .collect()
}

/// Index pass: adds by missing name; drops only non-unique DB indexes (the
/// uniques pass reconciles unique indexes).
fn diff_indexes(table: &str, indexes: &[IndexSpec], info: &TableSchemaInfo, diff: &mut DiffResult) {
    let db_names: HashSet<&str> = info.indexes.iter().map(|i| i.name.as_str()).collect();
    let model_names: HashSet<&str> = indexes.iter().map(|i| i.name.as_str()).collect();

    for index in indexes {
        if !db_names.contains(index.name.as_str()) {
            diff.indexes_to_add.push(IndexAdd {
                table: table.to_string(),
                index: index.clone(),
            });
        }
    }

    for index in &info.indexes {
        if !index.unique && !model_names.contains(index.name.as_str()) {
            diff.indexes_to_drop.push(IndexDrop {
                table: table.to_string(),
                name: index.name.clone(),
            });
        }
    }
}

/// Unique pass over DB unique indexes, matched by constraint name.
fn diff_uniques(
    table: &str,
    uniques: &[UniqueSpec],
    indexes: &[IndexSpec],
    info: &TableSchemaInfo,
    diff: &mut DiffResult,
) {
    let db_unique_names: HashSet<&str> = info
        .indexes
        .iter()
        .filter(|i| i.unique)
        .map(|i| i.name.as_str())
        .collect();

    for unique in uniques {
        if !db_unique_names.contains(unique.name.as_str()) {
            diff.uniques_to_add.push(UniqueAdd {
                table: table.to_string(),
                unique: unique.clone(),
            });
        }
    }

    // Names the model accounts for: declared uniques, declared unique
    // indexes, and the primary key's backing index.
    let mut claimed: HashSet<&str> = uniques.iter().map(|u| u.name.as_str()).collect();
    claimed.extend(indexes.iter().filter(|i| i.unique).map(|i| i.name.as_str()));
    let pk_name = info
        .primary_key
        .as_ref()
        .and_then(|pk| pk.constraint_name.as_deref());

    for index in info.indexes.iter().filter(|i| i.unique) {
        let is_pk_index = pk_name == Some(index.name.as_str());
        if !is_pk_index && !claimed.contains(index.name.as_str()) {
            diff.uniques_to_drop.push(UniqueDrop {
                table: table.to_string(),
                name: index.name.clone(),
                columns: index.columns.clone(),
            });
        }
    }
}

/// Relation pass.
///
/// A relation whose model declares a constraint name is matched by that
/// name. An unnamed relation first tries its derived name, then adopts any
/// live key with the same column and target, so an engine-assigned default
/// name (`posts_author_id_fkey`) never reads as drift. A match with the same
/// target but different referential actions is an in-place redefinition
/// (`relations_to_modify`); every other mismatch produces independent add
/// and drop entries, never a merge.
fn diff_relations(
    table: &str,
    expected: &[ExpectedForeignKey],
    info: &TableSchemaInfo,
    diff: &mut DiffResult,
) {
    let db_fks: HashMap<&str, &TableForeignKeyInfo> = info
        .foreign_keys
        .iter()
        .map(|fk| (fk.constraint_name.as_str(), fk))
        .collect();
    let mut claimed: HashSet<&str> = HashSet::new();

    for expected_fk in expected {
        let fk = &expected_fk.def;
        let mut actual = db_fks.get(fk.constraint_name.as_str()).copied();
        if actual.is_none() && !expected_fk.name_declared {
            actual = info
                .foreign_keys
                .iter()
                .find(|&db| !claimed.contains(db.constraint_name.as_str()) && same_target(fk, db));
        }

        match actual {
            None => diff.relations_to_add.push(RelationAdd {
                table: table.to_string(),
                fk: fk.clone(),
            }),
            Some(actual) => {
                claimed.insert(actual.constraint_name.as_str());
                if relation_matches(fk, actual) {
                    continue;
                }
                if same_target(fk, actual) {
                    diff.relations_to_modify.push(RelationModify {
                        table: table.to_string(),
                        existing: actual.clone(),
                        fk: fk.clone(),
                    });
                } else {
                    diff.relations_to_drop.push(RelationDrop {
                        table: table.to_string(),
                        fk: actual.clone(),
                    });
                    diff.relations_to_add.push(RelationAdd {
                        table: table.to_string(),
                        fk: fk.clone(),
                    });
                }
            }
        }
    }

    for fk in &info.foreign_keys {
        if !claimed.contains(fk.constraint_name.as_str()) {
            diff.relations_to_drop.push(RelationDrop {
                table: table.to_string(),
                fk: fk.clone(),
            });
        }
    }
}

/// Whether the introspected key references the same table and columns.
fn same_target(expected: &ForeignKeyDef, actual: &TableForeignKeyInfo) -> bool {
    expected.referenced_table == actual.referenced_table
        && expected.referenced_column == actual.referenced_column
        && expected.column == actual.column
}

/// Full relation equality: target plus case-insensitive action match for
/// every action the model declares.
fn relation_matches(expected: &ForeignKeyDef, actual: &TableForeignKeyInfo) -> bool {
    if !same_target(expected, actual) {
        return false;
    }

    if let Some(on_delete) = expected.on_delete {
        match actual.on_delete.as_deref() {
            Some(raw) if on_delete.matches(raw) => {}
            _ => return false,
        }
    }
    if let Some(on_update) = expected.on_update {
        match actual.on_update.as_deref() {
            Some(raw) if on_update.matches(raw) => {}
            _ => return false,
        }
    }

    true
}

/// Primary key pass.
fn diff_primary_key(model: &ModelSchema, info: &TableSchemaInfo, diff: &mut DiffResult) {
    let table = model.table.as_str();
    match (&model.primary_key, &info.primary_key) {
        (Some(pk), None) => diff.primary_keys_to_add.push(PrimaryKeyAdd {
            table: table.to_string(),
            pk: pk.clone(),
        }),
        (None, Some(existing)) => diff.primary_keys_to_drop.push(PrimaryKeyDrop {
            table: table.to_string(),
            pk: existing.clone(),
        }),
        (Some(pk), Some(existing)) => {
            let columns_differ = pk.columns != existing.columns;
            let name_differs = match (&pk.constraint_name, &existing.constraint_name) {
                (Some(declared), actual) => actual.as_deref() != Some(declared.as_str()),
                (None, _) => false,
            };
            if columns_differ || name_differs {
                diff.primary_keys_to_modify.push(PrimaryKeyModify {
                    table: table.to_string(),
                    pk: pk.clone(),
                    existing: existing.clone(),
                });
            }
        }
        (None, None) => {}
    }
}
