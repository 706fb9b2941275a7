//! Plan orchestration: diff, generate, flatten.

use tracing::debug;

use drift_schema::ModelRegistry;

use crate::diff::{DiffOptions, SchemaDiff, SchemaIntrospector};
use crate::dialect::DdlCompiler;
use crate::error::Result;
use crate::generate::OperationGenerator;
use crate::graph;
use crate::ops::MigrationOperation;

/// End-to-end planner: introspect, diff, generate, order.
pub struct MigrationPlanner<'a> {
    registry: &'a ModelRegistry,
    options: DiffOptions,
    ddl: &'a dyn DdlCompiler,
}

impl<'a> MigrationPlanner<'a> {
    /// Creates a planner for a registry, diff options, and DDL compiler.
    #[must_use]
    pub const fn new(
        registry: &'a ModelRegistry,
        options: DiffOptions,
        ddl: &'a dyn DdlCompiler,
    ) -> Self {
        Self {
            registry,
            options,
            ddl,
        }
    }

    /// Computes the migration plan against the database behind
    /// `introspector`.
    ///
    /// # Errors
    ///
    /// Any introspection, normalization, ordering, or rendering failure
    /// aborts the run; no partial plan is ever returned.
    pub async fn plan<I: SchemaIntrospector + Sync>(
        &self,
        introspector: &I,
    ) -> Result<MigrationPlan> {
        let diff = SchemaDiff::new(self.registry, self.options)
            .make_diff(introspector)
            .await?;
        let mut warnings = graph::analyze_constraint_impact(&diff);
        warnings.extend(
            graph::detect_mixed_operations(&diff)
                .into_iter()
                .map(|table| {
                    format!("plan mixes creative and destructive operations on table '{table}'")
                }),
        );
        let operations = OperationGenerator::new(self.ddl).generate(&diff)?;
        let plan = MigrationPlan::from_operations(operations).with_warnings(warnings);
        debug!(
            operations = plan.operations().len(),
            statements = plan.sql_statements().len(),
            "migration plan ready"
        );
        Ok(plan)
    }
}

/// An ordered, fully rendered migration plan.
///
/// Operations are sorted by phase with a stable sort, so the generator's
/// intra-phase order survives. Serializes for external tooling (dry-run
/// review, plan archival); construction always goes through
/// [`MigrationPlan::from_operations`].
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MigrationPlan {
    operations: Vec<MigrationOperation>,
    warnings: Vec<String>,
}

impl MigrationPlan {
    /// Builds a plan from generated operations, enforcing phase order.
    #[must_use]
    pub fn from_operations(mut operations: Vec<MigrationOperation>) -> Self {
        operations.sort_by_key(|op| op.phase);
        Self {
            operations,
            warnings: Vec::new(),
        }
    }

    /// Attaches advisory findings gathered while planning.
    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    /// The ordered operations.
    #[must_use]
    pub fn operations(&self) -> &[MigrationOperation] {
        &self.operations
    }

    /// Whether the plan does anything at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Advisory findings: additions referencing dropped objects, tables
    /// touched by both creative and destructive operations. Never affects
    /// ordering or execution.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Flattens the plan into SQL statements in execution order.
    #[must_use]
    pub fn sql_statements(&self) -> Vec<String> {
        self.operations
            .iter()
            .flat_map(|op| op.sql_statements.iter().cloned())
            .collect()
    }

    /// Human-readable operation descriptions, for dry runs and logs.
    #[must_use]
    pub fn describe(&self) -> Vec<String> {
        self.operations
            .iter()
            .map(|op| op.kind.description())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::PostgresDdl;
    use crate::ops::{ExecutionPhase, OperationKind};
    use drift_schema::{ColumnSpec, ColumnType, Dialect, ModelSchema, TableSchemaInfo};
    use std::collections::BTreeMap;
    use std::future::Future;

    #[derive(Default)]
    struct FixtureDb {
        tables: BTreeMap<String, TableSchemaInfo>,
    }

    impl SchemaIntrospector for FixtureDb {
        fn table_schema(
            &self,
            table: &str,
        ) -> impl Future<Output = crate::error::Result<Option<TableSchemaInfo>>> + Send {
            let info = self.tables.get(table).cloned();
            async move { Ok(info) }
        }

        fn table_names(&self) -> impl Future<Output = crate::error::Result<Vec<String>>> + Send {
            let names = self.tables.keys().cloned().collect();
            async move { Ok(names) }
        }
    }

    #[test]
    fn test_plan_against_empty_database() {
        let registry = ModelRegistry::new().with(
            ModelSchema::new("users")
                .column(
                    ColumnSpec::new("id", ColumnType::BigInt)
                        .primary_key()
                        .auto_increment(),
                )
                .column(
                    ColumnSpec::new("email", ColumnType::Varchar)
                        .length(255)
                        .not_null(),
                ),
        );
        let ddl = PostgresDdl::new();
        let planner = MigrationPlanner::new(&registry, DiffOptions::new(Dialect::Postgres), &ddl);

        let plan =
            futures::executor::block_on(planner.plan(&FixtureDb::default())).unwrap();

        assert_eq!(plan.operations().len(), 1);
        assert!(matches!(
            &plan.operations()[0].kind,
            OperationKind::CreateTable { model } if model.table == "users"
        ));
        let sql = plan.sql_statements();
        assert_eq!(sql.len(), 1);
        assert!(sql[0].starts_with("CREATE TABLE \"users\""));
    }

    #[test]
    fn test_plan_carries_mixed_operation_warnings() {
        let registry = ModelRegistry::new().with(
            ModelSchema::new("users")
                .column(ColumnSpec::new("id", ColumnType::BigInt).primary_key())
                .column(ColumnSpec::new("bio", ColumnType::Text)),
        );
        let mut db = FixtureDb::default();
        db.tables.insert(
            "users".to_string(),
            TableSchemaInfo::new()
                .column(drift_schema::TableColumnInfo::new("id", "int8").primary_key())
                .column(drift_schema::TableColumnInfo::new("legacy", "text"))
                .primary_key(
                    drift_schema::TablePrimaryKeyInfo::new(vec!["id".to_string()])
                        .constraint_name("users_pkey"),
                ),
        );
        let ddl = PostgresDdl::new();
        let planner = MigrationPlanner::new(&registry, DiffOptions::new(Dialect::Postgres), &ddl);

        let plan = futures::executor::block_on(planner.plan(&db)).unwrap();

        assert!(!plan.is_empty());
        assert_eq!(plan.warnings().len(), 1);
        assert!(plan.warnings()[0].contains("'users'"));
    }

    #[test]
    fn test_failed_introspection_yields_no_plan() {
        struct BrokenDb;

        impl SchemaIntrospector for BrokenDb {
            fn table_schema(
                &self,
                table: &str,
            ) -> impl Future<Output = crate::error::Result<Option<TableSchemaInfo>>> + Send
            {
                let err = crate::error::PlanError::introspection(
                    table,
                    std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset"),
                );
                async move { Err(err) }
            }

            fn table_names(&self) -> impl Future<Output = crate::error::Result<Vec<String>>> + Send
            {
                async move { Ok(Vec::new()) }
            }
        }

        let registry = ModelRegistry::new().with(
            ModelSchema::new("users")
                .column(ColumnSpec::new("id", ColumnType::BigInt).primary_key()),
        );
        let ddl = PostgresDdl::new();
        let planner = MigrationPlanner::new(&registry, DiffOptions::new(Dialect::Postgres), &ddl);

        let err = futures::executor::block_on(planner.plan(&BrokenDb)).unwrap_err();
        assert!(matches!(
            &err,
            crate::error::PlanError::Introspection { table, .. } if table == "users"
        ));
        assert!(err.to_string().starts_with("introspection failed for table 'users'"));
    }

    #[test]
    fn test_phase_sort_is_stable() {
        let ops = vec![
            MigrationOperation::new(
                OperationKind::DropTable {
                    table: "old".to_string(),
                },
                ExecutionPhase::Destructive,
            ),
            MigrationOperation::new(
                OperationKind::DropConstraint {
                    table: "users".to_string(),
                    constraint_name: "email_unique".to_string(),
                },
                ExecutionPhase::ConstraintCreation,
            ),
            MigrationOperation::new(
                OperationKind::AddUniqueConstraint {
                    table: "users".to_string(),
                    unique: drift_schema::UniqueSpec::new(
                        "uq_users_email",
                        vec!["email".to_string()],
                    ),
                },
                ExecutionPhase::ConstraintCreation,
            ),
        ];

        let plan = MigrationPlan::from_operations(ops);
        let phases: Vec<_> = plan.operations().iter().map(|op| op.phase).collect();
        assert_eq!(
            phases,
            vec![
                ExecutionPhase::ConstraintCreation,
                ExecutionPhase::ConstraintCreation,
                ExecutionPhase::Destructive,
            ]
        );
        // Drop before add inside the constraint phase.
        assert!(matches!(
            &plan.operations()[0].kind,
            OperationKind::DropConstraint { .. }
        ));
    }
}
