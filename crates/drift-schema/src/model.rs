//! Desired-side schema declarations.
//!
//! These types describe what the code expects the database to look like.
//! The model layer builds them from its field metadata and hands the planner
//! an explicit [`ModelRegistry`]; there is no process-wide registry, so the
//! planner can be driven entirely by synthetic fixtures in tests.

use serde::{Deserialize, Serialize};

use crate::types::{ColumnType, ReferentialAction};

/// Declared schema for a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Property name on the model.
    pub name: String,
    /// Column name in the database. Often equals `name`, but models may map
    /// a property onto a differently named column.
    pub db_name: String,
    /// Semantic type tag.
    pub column_type: ColumnType,
    /// Declared length for character/binary types.
    pub length: Option<u32>,
    /// Declared precision for numeric types.
    pub precision: Option<u32>,
    /// Declared scale for numeric types.
    pub scale: Option<u32>,
    /// Whether a temporal column carries a timezone.
    pub timezone: bool,
    /// Whether the column allows NULL.
    pub nullable: bool,
    /// Default value as a SQL literal, if declared.
    pub default: Option<String>,
    /// Whether this column is part of the primary key.
    pub primary_key: bool,
    /// Whether the engine updates this column on row update
    /// (e.g. MySQL `ON UPDATE CURRENT_TIMESTAMP`).
    pub auto_update: bool,
    /// Whether this column auto-increments.
    pub auto_increment: bool,
}

impl ColumnSpec {
    /// Creates a column whose database name equals its model name.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        let name = name.into();
        Self {
            db_name: name.clone(),
            name,
            column_type,
            length: None,
            precision: None,
            scale: None,
            timezone: false,
            nullable: true,
            default: None,
            primary_key: false,
            auto_update: false,
            auto_increment: false,
        }
    }

    /// Maps the column onto a different database name.
    #[must_use]
    pub fn db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = db_name.into();
        self
    }

    /// Sets the declared length.
    #[must_use]
    pub const fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Sets precision and scale.
    #[must_use]
    pub const fn precision_scale(mut self, precision: u32, scale: u32) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Marks a temporal column as timezone-aware.
    #[must_use]
    pub const fn with_timezone(mut self) -> Self {
        self.timezone = true;
        self
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the default value literal.
    #[must_use]
    pub fn default_value(mut self, literal: impl Into<String>) -> Self {
        self.default = Some(literal.into());
        self
    }

    /// Marks the column as (part of) the primary key. Primary key columns
    /// are always NOT NULL.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Marks the column as auto-updated by the engine.
    #[must_use]
    pub const fn auto_update(mut self) -> Self {
        self.auto_update = true;
        self
    }

    /// Marks the column as auto-incrementing.
    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}

/// Declared index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name.
    pub name: String,
    /// Indexed columns, in order.
    pub columns: Vec<String>,
    /// Whether this is a unique index.
    pub unique: bool,
}

impl IndexSpec {
    /// Creates a non-unique index.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: false,
        }
    }

    /// Creates a non-unique index with no declared name. Consumers derive a
    /// deterministic default from the table and columns.
    #[must_use]
    pub fn unnamed(columns: Vec<String>) -> Self {
        Self::new(String::new(), columns)
    }

    /// Makes the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Declared unique constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueSpec {
    /// Constraint name.
    pub name: String,
    /// Constrained columns, in order.
    pub columns: Vec<String>,
}

impl UniqueSpec {
    /// Creates a unique constraint.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Creates a unique constraint with no declared name. Consumers derive a
    /// deterministic default from the table and columns.
    #[must_use]
    pub fn unnamed(columns: Vec<String>) -> Self {
        Self::new(String::new(), columns)
    }
}

/// Relation cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// Foreign key on this table pointing at the target table.
    BelongsTo,
    /// Join-table relation; materialized by the planner as a synthetic
    /// belongs-to on the through table.
    ManyToMany,
}

/// Declared relation between two tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSpec {
    /// Relation cardinality.
    pub kind: RelationKind,
    /// Foreign-key column on the source side.
    pub source_column: String,
    /// Referenced table.
    pub target_table: String,
    /// Referenced column(s).
    pub target_columns: Vec<String>,
    /// Explicit constraint name, if the model declares one.
    pub constraint_name: Option<String>,
    /// Declared ON DELETE action, if any.
    pub on_delete: Option<ReferentialAction>,
    /// Declared ON UPDATE action, if any.
    pub on_update: Option<ReferentialAction>,
    /// Join table for many-to-many relations.
    pub through_table: Option<String>,
}

impl RelationSpec {
    /// Creates a belongs-to relation referencing a single column.
    #[must_use]
    pub fn belongs_to(
        source_column: impl Into<String>,
        target_table: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            kind: RelationKind::BelongsTo,
            source_column: source_column.into(),
            target_table: target_table.into(),
            target_columns: vec![target_column.into()],
            constraint_name: None,
            on_delete: None,
            on_update: None,
            through_table: None,
        }
    }

    /// Creates a many-to-many relation through a join table.
    #[must_use]
    pub fn many_to_many(
        through_table: impl Into<String>,
        source_column: impl Into<String>,
        target_table: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            kind: RelationKind::ManyToMany,
            source_column: source_column.into(),
            target_table: target_table.into(),
            target_columns: vec![target_column.into()],
            constraint_name: None,
            on_delete: None,
            on_update: None,
            through_table: Some(through_table.into()),
        }
    }

    /// Sets an explicit constraint name.
    #[must_use]
    pub fn constraint_name(mut self, name: impl Into<String>) -> Self {
        self.constraint_name = Some(name.into());
        self
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub const fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub const fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }
}

/// Declared primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKeySpec {
    /// Key columns, in order.
    pub columns: Vec<String>,
    /// Explicit constraint name, if the model declares one.
    pub constraint_name: Option<String>,
}

impl PrimaryKeySpec {
    /// Creates a primary key over the given columns.
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            constraint_name: None,
        }
    }

    /// Sets an explicit constraint name.
    #[must_use]
    pub fn constraint_name(mut self, name: impl Into<String>) -> Self {
        self.constraint_name = Some(name.into());
        self
    }
}

/// Complete declared schema for one model/table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSchema {
    /// Table name in the database.
    pub table: String,
    /// Column declarations.
    pub columns: Vec<ColumnSpec>,
    /// Index declarations.
    pub indexes: Vec<IndexSpec>,
    /// Unique-constraint declarations.
    pub uniques: Vec<UniqueSpec>,
    /// Relation declarations.
    pub relations: Vec<RelationSpec>,
    /// Explicit primary key, when the model declares one beyond the
    /// per-column flags.
    pub primary_key: Option<PrimaryKeySpec>,
}

impl ModelSchema {
    /// Creates an empty model schema for a table.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            uniques: Vec::new(),
            relations: Vec::new(),
            primary_key: None,
        }
    }

    /// Adds a column. A primary-key column is also recorded in the model's
    /// [`PrimaryKeySpec`].
    #[must_use]
    pub fn column(mut self, column: ColumnSpec) -> Self {
        if column.primary_key {
            let pk = self
                .primary_key
                .get_or_insert_with(|| PrimaryKeySpec::new(Vec::new()));
            if !pk.columns.contains(&column.db_name) {
                pk.columns.push(column.db_name.clone());
            }
        }
        self.columns.push(column);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    /// Adds a unique constraint.
    #[must_use]
    pub fn unique(mut self, unique: UniqueSpec) -> Self {
        self.uniques.push(unique);
        self
    }

    /// Adds a relation.
    #[must_use]
    pub fn relation(mut self, relation: RelationSpec) -> Self {
        self.relations.push(relation);
        self
    }

    /// Sets an explicit primary key.
    #[must_use]
    pub fn primary_key(mut self, pk: PrimaryKeySpec) -> Self {
        self.primary_key = Some(pk);
        self
    }

    /// Finds a column by its database name.
    #[must_use]
    pub fn column_by_db_name(&self, db_name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.db_name == db_name)
    }
}

/// Explicit collection of model schemas handed to the planner.
///
/// Iteration order is lexicographic by table name, which is what makes
/// planner output reproducible regardless of registration order or
/// introspection timing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelRegistry {
    models: Vec<ModelSchema>,
}

impl ModelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model, keeping the registry sorted by table name.
    pub fn register(&mut self, model: ModelSchema) {
        let pos = self
            .models
            .partition_point(|m| m.table.as_str() < model.table.as_str());
        self.models.insert(pos, model);
    }

    /// Builder-style registration.
    #[must_use]
    pub fn with(mut self, model: ModelSchema) -> Self {
        self.register(model);
        self
    }

    /// Returns the registered models in table-name order.
    #[must_use]
    pub fn models(&self) -> &[ModelSchema] {
        &self.models
    }

    /// Looks up a model by table name.
    #[must_use]
    pub fn get(&self, table: &str) -> Option<&ModelSchema> {
        self.models
            .binary_search_by(|m| m.table.as_str().cmp(table))
            .ok()
            .map(|i| &self.models[i])
    }

    /// Whether a model is registered for the table.
    #[must_use]
    pub fn contains(&self, table: &str) -> bool {
        self.get(table).is_some()
    }

    /// Number of registered models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
