//! End-to-end planner scenarios against an in-memory introspector.

use std::collections::BTreeMap;
use std::future::Future;

use drift_planner::diff::{DiffOptions, DiffResult, SchemaDiff, SchemaIntrospector};
use drift_planner::dialect::PostgresDdl;
use drift_planner::ops::{ExecutionPhase, ForeignKeyDef, OperationKind};
use drift_planner::{MigrationPlanner, Result};
use drift_schema::{
    ColumnSpec, ColumnType, Dialect, IndexSpec, ModelRegistry, ModelSchema, RelationSpec,
    TableColumnInfo, TableForeignKeyInfo, TableIndexInfo, TablePrimaryKeyInfo, TableSchemaInfo,
    UniqueSpec,
};

#[derive(Debug, Clone, Default)]
struct FixtureDb {
    tables: BTreeMap<String, TableSchemaInfo>,
}

impl FixtureDb {
    fn new() -> Self {
        Self::default()
    }

    fn table(mut self, name: &str, info: TableSchemaInfo) -> Self {
        self.tables.insert(name.to_string(), info);
        self
    }
}

impl SchemaIntrospector for FixtureDb {
    fn table_schema(
        &self,
        table: &str,
    ) -> impl Future<Output = Result<Option<TableSchemaInfo>>> + Send {
        let info = self.tables.get(table).cloned();
        async move { Ok(info) }
    }

    fn table_names(&self) -> impl Future<Output = Result<Vec<String>>> + Send {
        let names = self.tables.keys().cloned().collect();
        async move { Ok(names) }
    }
}

fn users_model() -> ModelSchema {
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
        )
        .unique(UniqueSpec::new("uq_users_email", vec!["email".to_string()]))
}

fn posts_model() -> ModelSchema {
    ModelSchema::new("posts")
        .column(
            ColumnSpec::new("id", ColumnType::BigInt)
                .primary_key()
                .auto_increment(),
        )
        .column(ColumnSpec::new("author_id", ColumnType::BigInt).not_null())
        .column(
            ColumnSpec::new("views", ColumnType::Integer)
                .not_null()
                .default_value("0"),
        )
        .relation(RelationSpec::belongs_to("author_id", "users", "id"))
        .index(IndexSpec::new(
            "idx_posts_author_id",
            vec!["author_id".to_string()],
        ))
}

fn column_info(column: &ColumnSpec) -> TableColumnInfo {
    let mut info = TableColumnInfo::new(&column.db_name, column.column_type.canonical_name());
    if let Some(length) = column.length {
        info = info.length(length);
    }
    if let (Some(precision), Some(scale)) = (column.precision, column.scale) {
        info = info.precision_scale(precision, scale);
    }
    if column.timezone {
        info = info.with_timezone();
    }
    if !column.nullable {
        info = info.not_null();
    }
    if let Some(default) = &column.default {
        info = info.default_value(default.clone());
    }
    if column.primary_key {
        info = info.primary_key();
    }
    info
}

fn fk_info(fk: &ForeignKeyDef) -> TableForeignKeyInfo {
    let mut info = TableForeignKeyInfo::new(
        &fk.constraint_name,
        &fk.column,
        &fk.referenced_table,
        &fk.referenced_column,
    );
    if let Some(action) = fk.on_delete {
        info = info.on_delete(action.to_sql());
    }
    if let Some(action) = fk.on_update {
        info = info.on_update(action.to_sql());
    }
    info
}

/// Simulates applying a diff to the fixture catalog.
fn apply_diff(db: &mut BTreeMap<String, TableSchemaInfo>, diff: &DiffResult) {
    for model in &diff.tables_to_add {
        let mut info = TableSchemaInfo::new();
        for column in &model.columns {
            info.columns.push(column_info(column));
        }
        if let Some(pk) = &model.primary_key {
            let mut pk_info = TablePrimaryKeyInfo::new(pk.columns.clone());
            if let Some(name) = &pk.constraint_name {
                pk_info = pk_info.constraint_name(name.clone());
            }
            info.primary_key = Some(pk_info);
        }
        db.insert(model.table.clone(), info);
    }
    for drop in &diff.tables_to_drop {
        db.remove(&drop.table);
    }

    for add in &diff.columns_to_add {
        if let Some(info) = db.get_mut(&add.table) {
            info.columns.push(column_info(&add.column));
        }
    }
    for drop in &diff.columns_to_drop {
        if let Some(info) = db.get_mut(&drop.table) {
            info.columns.retain(|c| c.name != drop.column);
        }
    }
    for modify in &diff.columns_to_modify {
        if let Some(info) = db.get_mut(&modify.table) {
            if let Some(column) = info
                .columns
                .iter_mut()
                .find(|c| c.name == modify.column.db_name)
            {
                *column = column_info(&modify.column);
            }
        }
    }

    for add in &diff.indexes_to_add {
        if let Some(info) = db.get_mut(&add.table) {
            info.indexes.push(TableIndexInfo::new(
                &add.index.name,
                add.index.columns.clone(),
                add.index.unique,
            ));
        }
    }
    for drop in &diff.indexes_to_drop {
        if let Some(info) = db.get_mut(&drop.table) {
            info.indexes.retain(|i| i.name != drop.name);
        }
    }
    for add in &diff.uniques_to_add {
        if let Some(info) = db.get_mut(&add.table) {
            info.indexes.push(TableIndexInfo::new(
                &add.unique.name,
                add.unique.columns.clone(),
                true,
            ));
        }
    }
    for drop in &diff.uniques_to_drop {
        if let Some(info) = db.get_mut(&drop.table) {
            info.indexes.retain(|i| i.name != drop.name);
        }
    }

    for add in &diff.relations_to_add {
        if let Some(info) = db.get_mut(&add.table) {
            info.foreign_keys.push(fk_info(&add.fk));
        }
    }
    for drop in &diff.relations_to_drop {
        if let Some(info) = db.get_mut(&drop.table) {
            info.foreign_keys
                .retain(|fk| fk.constraint_name != drop.fk.constraint_name);
        }
    }
    for modify in &diff.relations_to_modify {
        if let Some(info) = db.get_mut(&modify.table) {
            if let Some(fk) = info
                .foreign_keys
                .iter_mut()
                .find(|fk| fk.constraint_name == modify.existing.constraint_name)
            {
                *fk = fk_info(&modify.fk);
            }
        }
    }

    for add in &diff.primary_keys_to_add {
        if let Some(info) = db.get_mut(&add.table) {
            info.primary_key = Some(TablePrimaryKeyInfo::new(add.pk.columns.clone()));
        }
    }
    for drop in &diff.primary_keys_to_drop {
        if let Some(info) = db.get_mut(&drop.table) {
            info.primary_key = None;
        }
    }
    for modify in &diff.primary_keys_to_modify {
        if let Some(info) = db.get_mut(&modify.table) {
            let mut pk_info = TablePrimaryKeyInfo::new(modify.pk.columns.clone());
            if let Some(name) = &modify.pk.constraint_name {
                pk_info = pk_info.constraint_name(name.clone());
            }
            info.primary_key = Some(pk_info);
        }
    }
}

#[tokio::test]
async fn new_tables_plan_completely_from_empty_database() {
    let registry = ModelRegistry::new().with(users_model()).with(posts_model());
    let db = FixtureDb::new();

    let diff = SchemaDiff::new(&registry, DiffOptions::new(Dialect::Postgres))
        .make_diff(&db)
        .await
        .unwrap();

    assert_eq!(diff.tables_to_add.len(), 2);
    assert!(diff.columns_to_add.is_empty());
    assert!(diff.columns_to_drop.is_empty());
    assert!(diff.columns_to_modify.is_empty());
    assert_eq!(diff.indexes_to_add.len(), 1);
    assert_eq!(diff.uniques_to_add.len(), 1);
    assert_eq!(diff.relations_to_add.len(), 1);
    assert_eq!(
        diff.relations_to_add[0].fk.constraint_name,
        "fk_posts_author_id_users"
    );
}

#[tokio::test]
async fn equivalent_schema_diffs_empty() {
    let registry = ModelRegistry::new().with(users_model());
    let db = FixtureDb::new().table(
        "users",
        TableSchemaInfo::new()
            .column(
                TableColumnInfo::new("id", "int8")
                    .primary_key()
                    .default_value("nextval('users_id_seq'::regclass)"),
            )
            .column(
                TableColumnInfo::new("email", "character varying")
                    .length(255)
                    .not_null(),
            )
            .index(TableIndexInfo::new(
                "uq_users_email",
                vec!["email".to_string()],
                true,
            ))
            .primary_key(TablePrimaryKeyInfo::new(vec!["id".to_string()]).constraint_name("users_pkey")),
    );

    let diff = SchemaDiff::new(&registry, DiffOptions::new(Dialect::Postgres))
        .make_diff(&db)
        .await
        .unwrap();

    assert!(diff.is_empty(), "unexpected drift: {diff:?}");
}

#[tokio::test]
async fn float_precision_is_tolerated_on_postgres() {
    let model = ModelSchema::new("metrics")
        .column(ColumnSpec::new("id", ColumnType::BigInt).primary_key())
        .column(ColumnSpec::new("score", ColumnType::Double).precision_scale(53, 0));
    let registry = ModelRegistry::new().with(model);
    let db = FixtureDb::new().table(
        "metrics",
        TableSchemaInfo::new()
            .column(TableColumnInfo::new("id", "int8").primary_key())
            .column(TableColumnInfo::new("score", "double precision"))
            .primary_key(TablePrimaryKeyInfo::new(vec!["id".to_string()])),
    );

    let diff = SchemaDiff::new(&registry, DiffOptions::new(Dialect::Postgres))
        .make_diff(&db)
        .await
        .unwrap();

    assert!(diff.is_empty(), "unexpected drift: {diff:?}");
}

#[tokio::test]
async fn applying_a_plan_is_idempotent() {
    let registry = ModelRegistry::new().with(users_model()).with(posts_model());
    // Partially drifted database: posts missing entirely, users carrying a
    // leftover column and an old unique name.
    let mut tables = BTreeMap::new();
    tables.insert(
        "users".to_string(),
        TableSchemaInfo::new()
            .column(TableColumnInfo::new("id", "int8").primary_key())
            .column(
                TableColumnInfo::new("email", "varchar")
                    .length(255)
                    .not_null(),
            )
            .column(TableColumnInfo::new("legacy", "text"))
            .index(TableIndexInfo::new(
                "email_unique",
                vec!["email".to_string()],
                true,
            ))
            .primary_key(TablePrimaryKeyInfo::new(vec!["id".to_string()])),
    );
    let db = FixtureDb {
        tables: tables.clone(),
    };

    let differ = SchemaDiff::new(&registry, DiffOptions::new(Dialect::Postgres));
    let diff = differ.make_diff(&db).await.unwrap();
    assert!(!diff.is_empty());

    apply_diff(&mut tables, &diff);
    let db_after = FixtureDb { tables };
    let rediff = differ.make_diff(&db_after).await.unwrap();
    assert!(rediff.is_empty(), "plan not idempotent: {rediff:?}");
}

#[tokio::test]
async fn unmanaged_tables_drop_in_safe_order() {
    let registry = ModelRegistry::new();
    let db = FixtureDb::new()
        .table(
            "a",
            TableSchemaInfo::new().column(TableColumnInfo::new("id", "int8").primary_key()),
        )
        .table(
            "b",
            TableSchemaInfo::new()
                .column(TableColumnInfo::new("id", "int8").primary_key())
                .column(TableColumnInfo::new("a_id", "int8"))
                .foreign_key(TableForeignKeyInfo::new("fk_b_a", "a_id", "a", "id")),
        );

    let ddl = PostgresDdl::new();
    let planner = MigrationPlanner::new(
        &registry,
        DiffOptions::new(Dialect::Postgres).drop_unmanaged_tables(),
        &ddl,
    );
    let plan = planner.plan(&db).await.unwrap();

    let ops = plan.operations();
    let fk_drop = ops
        .iter()
        .position(|op| {
            matches!(&op.kind, OperationKind::DropForeignKey { constraint_name, .. } if constraint_name == "fk_b_a")
        })
        .expect("fk drop present");
    let table_a_drop = ops
        .iter()
        .position(|op| matches!(&op.kind, OperationKind::DropTable { table } if table == "a"))
        .expect("table a drop present");
    assert!(fk_drop < table_a_drop);
}

#[tokio::test]
async fn foreign_key_churn_cancels_both_sides() {
    // The model points ref_id at table_a; the database has a key of the
    // same name pointing at table_b. The retargeting surfaces as an add and
    // a drop under one key, and both are filtered out. The genuinely new
    // key on author_id survives.
    let model = ModelSchema::new("posts")
        .column(ColumnSpec::new("id", ColumnType::BigInt).primary_key())
        .column(ColumnSpec::new("ref_id", ColumnType::BigInt))
        .column(ColumnSpec::new("author_id", ColumnType::BigInt))
        .relation(RelationSpec::belongs_to("ref_id", "table_a", "id").constraint_name("fk_posts_ref"))
        .relation(RelationSpec::belongs_to("author_id", "users", "id"));
    let registry = ModelRegistry::new().with(model);
    let db = FixtureDb::new().table(
        "posts",
        TableSchemaInfo::new()
            .column(TableColumnInfo::new("id", "int8").primary_key())
            .column(TableColumnInfo::new("ref_id", "int8"))
            .column(TableColumnInfo::new("author_id", "int8"))
            .foreign_key(TableForeignKeyInfo::new(
                "fk_posts_ref",
                "ref_id",
                "table_b",
                "id",
            ))
            .primary_key(TablePrimaryKeyInfo::new(vec!["id".to_string()])),
    );

    let ddl = PostgresDdl::new();
    let planner = MigrationPlanner::new(&registry, DiffOptions::new(Dialect::Postgres), &ddl);
    let plan = planner.plan(&db).await.unwrap();

    let ops = plan.operations();
    assert!(ops.iter().all(|op| {
        !matches!(
            &op.kind,
            OperationKind::AddForeignKey { fk, .. } if fk.constraint_name == "fk_posts_ref"
        ) && !matches!(
            &op.kind,
            OperationKind::DropForeignKey { constraint_name, .. } if constraint_name == "fk_posts_ref"
        )
    }));
    assert!(ops.iter().any(|op| matches!(
        &op.kind,
        OperationKind::AddForeignKey { fk, .. } if fk.constraint_name == "fk_posts_author_id_users"
    )));
}

#[tokio::test]
async fn flattened_statements_respect_phase_order() {
    let registry = ModelRegistry::new().with(users_model()).with(posts_model());
    let db = FixtureDb::new()
        .table(
            "users",
            TableSchemaInfo::new()
                .column(TableColumnInfo::new("id", "int8").primary_key())
                .column(
                    TableColumnInfo::new("email", "varchar")
                        .length(255)
                        .not_null(),
                )
                .column(TableColumnInfo::new("legacy", "text"))
                .index(TableIndexInfo::new(
                    "email_unique",
                    vec!["email".to_string()],
                    true,
                ))
                .primary_key(TablePrimaryKeyInfo::new(vec!["id".to_string()])),
        );

    let ddl = PostgresDdl::new();
    let planner = MigrationPlanner::new(&registry, DiffOptions::new(Dialect::Postgres), &ddl);
    let plan = planner.plan(&db).await.unwrap();

    let phases: Vec<ExecutionPhase> = plan.operations().iter().map(|op| op.phase).collect();
    let mut sorted = phases.clone();
    sorted.sort_unstable();
    assert_eq!(phases, sorted);

    // Destructive work present (legacy column drop) and ordered last.
    assert!(phases.contains(&ExecutionPhase::StructureCreation));
    assert!(phases.contains(&ExecutionPhase::Destructive));
    assert_eq!(plan.sql_statements().len(), plan
        .operations()
        .iter()
        .map(|op| op.sql_statements.len())
        .sum::<usize>());
}

#[tokio::test]
async fn add_column_and_unique_rename_scenario() {
    let users = ModelSchema::new("users")
        .column(
            ColumnSpec::new("id", ColumnType::BigInt)
                .primary_key()
                .auto_increment(),
        )
        .column(
            ColumnSpec::new("email", ColumnType::Varchar)
                .length(255)
                .not_null(),
        )
        .unique(UniqueSpec::new("uq_users_email", vec!["email".to_string()]));
    let posts = ModelSchema::new("posts")
        .column(
            ColumnSpec::new("id", ColumnType::BigInt)
                .primary_key()
                .auto_increment(),
        )
        .column(
            ColumnSpec::new("views", ColumnType::Integer)
                .not_null()
                .default_value("0"),
        );
    let registry = ModelRegistry::new().with(users).with(posts);

    let db = FixtureDb::new()
        .table(
            "users",
            TableSchemaInfo::new()
                .column(
                    TableColumnInfo::new("id", "int8")
                        .primary_key()
                        .default_value("nextval('users_id_seq'::regclass)"),
                )
                .column(
                    TableColumnInfo::new("email", "varchar")
                        .length(255)
                        .not_null(),
                )
                .index(TableIndexInfo::new(
                    "email_unique",
                    vec!["email".to_string()],
                    true,
                ))
                .primary_key(TablePrimaryKeyInfo::new(vec!["id".to_string()])),
        )
        .table(
            "posts",
            TableSchemaInfo::new()
                .column(
                    TableColumnInfo::new("id", "int8")
                        .primary_key()
                        .default_value("nextval('posts_id_seq'::regclass)"),
                )
                .primary_key(TablePrimaryKeyInfo::new(vec!["id".to_string()])),
        );

    let ddl = PostgresDdl::new();
    let planner = MigrationPlanner::new(&registry, DiffOptions::new(Dialect::Postgres), &ddl);
    let plan = planner.plan(&db).await.unwrap();

    let ops = plan.operations();
    assert_eq!(ops.len(), 3, "unexpected operations: {:?}", plan.describe());

    assert_eq!(ops[0].phase, ExecutionPhase::StructureCreation);
    assert!(matches!(
        &ops[0].kind,
        OperationKind::AddColumn { table, column }
            if table == "posts" && column.db_name == "views"
    ));

    assert_eq!(ops[1].phase, ExecutionPhase::ConstraintCreation);
    assert!(matches!(
        &ops[1].kind,
        OperationKind::DropConstraint { table, constraint_name }
            if table == "users" && constraint_name == "email_unique"
    ));

    assert_eq!(ops[2].phase, ExecutionPhase::ConstraintCreation);
    assert!(matches!(
        &ops[2].kind,
        OperationKind::AddUniqueConstraint { table, unique }
            if table == "users" && unique.name == "uq_users_email"
    ));

    let sql = plan.sql_statements();
    assert_eq!(
        sql,
        vec![
            "ALTER TABLE \"posts\" ADD COLUMN \"views\" integer NOT NULL DEFAULT 0",
            "ALTER TABLE \"users\" DROP CONSTRAINT \"email_unique\"",
            "ALTER TABLE \"users\" ADD CONSTRAINT \"uq_users_email\" UNIQUE (\"email\")",
        ]
    );
}
