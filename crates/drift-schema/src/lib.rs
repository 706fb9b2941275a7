//! Dialect-neutral schema data model for the drift migration planner.
//!
//! This crate holds the two vocabularies the planner compares:
//!
//! - the **desired** schema, declared in code by the model layer
//!   ([`model::ModelSchema`] and the `*Spec` types it is built from), and
//! - the **actual** schema, recovered from a live database by an
//!   introspector ([`introspect::TableSchemaInfo`] and the `Table*Info`
//!   types inside it).
//!
//! Everything here is plain data: no I/O, no SQL text. The planner crate
//! (`drift-planner`) owns the comparison and ordering logic; per-dialect SQL
//! rendering lives behind its `DdlCompiler` seam.

pub mod introspect;
pub mod model;
pub mod types;

pub use introspect::{
    TableColumnInfo, TableForeignKeyInfo, TableIndexInfo, TablePrimaryKeyInfo, TableSchemaInfo,
};
pub use model::{
    ColumnSpec, IndexSpec, ModelRegistry, ModelSchema, PrimaryKeySpec, RelationKind, RelationSpec,
    UniqueSpec,
};
pub use types::{ColumnType, Dialect, ReferentialAction};
