//! Schema migration planning.
//!
//! Compares declared model schemas ([`drift_schema::ModelRegistry`])
//! against a live database reached through a [`SchemaIntrospector`], and
//! turns the drift into an ordered, SQL-rendered [`MigrationPlan`].
//!
//! The pipeline is diff → drop-order resolution → operation generation →
//! phase-stable ordering. Operations execute in three strict phases:
//! structure creation, constraint creation, destructive. Within the
//! destructive phase a dependency graph sequences drops so nothing is
//! removed while something else still references it.
//!
//! # Example
//!
//! ```no_run
//! use drift_planner::{DiffOptions, MigrationPlanner, PostgresDdl};
//! use drift_schema::{ColumnSpec, ColumnType, Dialect, ModelRegistry, ModelSchema};
//!
//! # async fn demo(introspector: &(impl drift_planner::SchemaIntrospector + Sync)) -> drift_planner::Result<()> {
//! let registry = ModelRegistry::new().with(
//!     ModelSchema::new("users")
//!         .column(ColumnSpec::new("id", ColumnType::BigInt).primary_key().auto_increment())
//!         .column(ColumnSpec::new("email", ColumnType::Varchar).length(255).not_null()),
//! );
//!
//! let ddl = PostgresDdl::new();
//! let planner = MigrationPlanner::new(&registry, DiffOptions::new(Dialect::Postgres), &ddl);
//! let plan = planner.plan(introspector).await?;
//! for statement in plan.sql_statements() {
//!     println!("{statement};");
//! }
//! # Ok(())
//! # }
//! ```

pub mod diff;
pub mod dialect;
pub mod error;
pub mod generate;
pub mod graph;
pub mod naming;
pub mod normalize;
pub mod ops;
pub mod plan;

pub use diff::{DiffOptions, DiffResult, SchemaDiff, SchemaIntrospector};
pub use dialect::{DdlCompiler, PostgresDdl};
pub use error::{PlanError, Result};
pub use generate::OperationGenerator;
pub use graph::NodeId;
pub use normalize::DefaultChange;
pub use ops::{ExecutionPhase, ForeignKeyDef, MigrationOperation, OperationKind};
pub use plan::{MigrationPlan, MigrationPlanner};
