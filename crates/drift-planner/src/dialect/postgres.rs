//! PostgreSQL DDL compiler.
//!
//! Also used for CockroachDB, which accepts the same DDL surface for
//! everything the planner emits.

use drift_schema::{ColumnSpec, ColumnType, ModelSchema, PrimaryKeySpec};

use crate::error::Result;
use crate::naming;
use crate::ops::{ForeignKeyDef, OperationKind};

use super::DdlCompiler;

/// PostgreSQL DDL compiler.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDdl;

impl PostgresDdl {
    /// Creates a new Postgres compiler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn create_table_sql(&self, model: &ModelSchema) -> Result<String> {
        let mut sql = String::from("CREATE TABLE ");
        sql.push_str(&self.quote_identifier(&model.table));
        sql.push_str(" (\n  ");

        let mut defs = Vec::with_capacity(model.columns.len() + 1);
        for column in &model.columns {
            defs.push(self.column_definition(column)?);
        }
        if let Some(pk) = &model.primary_key {
            defs.push(self.primary_key_clause(&model.table, pk));
        }
        sql.push_str(&defs.join(",\n  "));

        sql.push_str("\n)");
        Ok(sql)
    }

    fn primary_key_clause(&self, table: &str, pk: &PrimaryKeySpec) -> String {
        let name = pk
            .constraint_name
            .clone()
            .unwrap_or_else(|| naming::pk_constraint_name(table));
        format!(
            "CONSTRAINT {} PRIMARY KEY ({})",
            self.quote_identifier(&name),
            self.quoted_list(&pk.columns)
        )
    }

    fn quoted_list(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|n| self.quote_identifier(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn add_foreign_key_sql(&self, table: &str, fk: &ForeignKeyDef) -> String {
        let mut sql = format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.quote_identifier(table),
            self.quote_identifier(&fk.constraint_name),
            self.quote_identifier(&fk.column),
            self.quote_identifier(&fk.referenced_table),
            self.quote_identifier(&fk.referenced_column),
        );
        if let Some(action) = fk.on_delete {
            sql.push_str(" ON DELETE ");
            sql.push_str(action.to_sql());
        }
        if let Some(action) = fk.on_update {
            sql.push_str(" ON UPDATE ");
            sql.push_str(action.to_sql());
        }
        sql
    }

    fn drop_constraint_sql(&self, table: &str, constraint_name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.quote_identifier(table),
            self.quote_identifier(constraint_name)
        )
    }

    fn modify_column_sql(
        &self,
        table: &str,
        column: &ColumnSpec,
        default_change: Option<crate::normalize::DefaultChange>,
    ) -> Result<Vec<String>> {
        let table_q = self.quote_identifier(table);
        let column_q = self.quote_identifier(&column.db_name);
        let type_name = self.type_name(column)?;

        let mut stmts = vec![format!(
            "ALTER TABLE {table_q} ALTER COLUMN {column_q} TYPE {type_name} USING {column_q}::{type_name}"
        )];
        if column.nullable {
            stmts.push(format!(
                "ALTER TABLE {table_q} ALTER COLUMN {column_q} DROP NOT NULL"
            ));
        } else {
            stmts.push(format!(
                "ALTER TABLE {table_q} ALTER COLUMN {column_q} SET NOT NULL"
            ));
        }
        match default_change {
            Some(crate::normalize::DefaultChange::Set) => {
                if let Some(default) = &column.default {
                    stmts.push(format!(
                        "ALTER TABLE {table_q} ALTER COLUMN {column_q} SET DEFAULT {default}"
                    ));
                }
            }
            Some(crate::normalize::DefaultChange::Drop) => {
                stmts.push(format!(
                    "ALTER TABLE {table_q} ALTER COLUMN {column_q} DROP DEFAULT"
                ));
            }
            None => {}
        }
        Ok(stmts)
    }
}

impl DdlCompiler for PostgresDdl {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn statements(&self, operation: &OperationKind) -> Result<Vec<String>> {
        match operation {
            OperationKind::CreateTable { model } => Ok(vec![self.create_table_sql(model)?]),
            OperationKind::AddColumn { table, column } => Ok(vec![format!(
                "ALTER TABLE {} ADD COLUMN {}",
                self.quote_identifier(table),
                self.column_definition(column)?
            )]),
            OperationKind::CreateIndex { table, index } => {
                let unique = if index.unique { "UNIQUE " } else { "" };
                Ok(vec![format!(
                    "CREATE {unique}INDEX {} ON {} ({})",
                    self.quote_identifier(&index.name),
                    self.quote_identifier(table),
                    self.quoted_list(&index.columns)
                )])
            }
            OperationKind::AddPrimaryKey { table, pk } => Ok(vec![format!(
                "ALTER TABLE {} ADD {}",
                self.quote_identifier(table),
                self.primary_key_clause(table, pk)
            )]),
            OperationKind::AddUniqueConstraint { table, unique } => Ok(vec![format!(
                "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
                self.quote_identifier(table),
                self.quote_identifier(&unique.name),
                self.quoted_list(&unique.columns)
            )]),
            OperationKind::AddForeignKey { table, fk } => {
                Ok(vec![self.add_foreign_key_sql(table, fk)])
            }
            OperationKind::DropForeignKey {
                table,
                constraint_name,
            }
            | OperationKind::DropConstraint {
                table,
                constraint_name,
            } => Ok(vec![self.drop_constraint_sql(table, constraint_name)]),
            OperationKind::DropColumn { table, column } => Ok(vec![format!(
                "ALTER TABLE {} DROP COLUMN {}",
                self.quote_identifier(table),
                self.quote_identifier(column)
            )]),
            OperationKind::DropIndex { name, .. } => {
                Ok(vec![format!("DROP INDEX {}", self.quote_identifier(name))])
            }
            OperationKind::DropTable { table } => Ok(vec![format!(
                "DROP TABLE {}",
                self.quote_identifier(table)
            )]),
            OperationKind::ModifyColumn {
                table,
                column,
                default_change,
            } => self.modify_column_sql(table, column, *default_change),
            OperationKind::ModifyPrimaryKey {
                table,
                pk,
                drop_existing,
            } => {
                let mut stmts = Vec::with_capacity(2);
                if let Some(existing) = drop_existing {
                    stmts.push(self.drop_constraint_sql(table, existing));
                }
                stmts.push(format!(
                    "ALTER TABLE {} ADD {}",
                    self.quote_identifier(table),
                    self.primary_key_clause(table, pk)
                ));
                Ok(stmts)
            }
        }
    }

    fn type_name(&self, column: &ColumnSpec) -> Result<String> {
        let name = match column.column_type {
            ColumnType::SmallInt => "smallint".to_string(),
            ColumnType::Integer => "integer".to_string(),
            ColumnType::BigInt => "bigint".to_string(),
            ColumnType::Varchar => column
                .length
                .map_or_else(|| "varchar".to_string(), |n| format!("varchar({n})")),
            ColumnType::Char => column
                .length
                .map_or_else(|| "char".to_string(), |n| format!("char({n})")),
            ColumnType::Text => "text".to_string(),
            ColumnType::Boolean => "boolean".to_string(),
            ColumnType::Real => "real".to_string(),
            ColumnType::Double => "double precision".to_string(),
            ColumnType::Decimal => match (column.precision, column.scale) {
                (Some(p), Some(s)) => format!("numeric({p}, {s})"),
                (Some(p), None) => format!("numeric({p})"),
                _ => "numeric".to_string(),
            },
            ColumnType::Date => "date".to_string(),
            ColumnType::Time => "time".to_string(),
            ColumnType::Timestamp => {
                if column.timezone {
                    "timestamptz".to_string()
                } else {
                    "timestamp".to_string()
                }
            }
            ColumnType::Json => "json".to_string(),
            ColumnType::Jsonb => "jsonb".to_string(),
            ColumnType::Uuid => "uuid".to_string(),
            ColumnType::Blob => "bytea".to_string(),
        };
        Ok(name)
    }

    fn auto_increment_clause(&self) -> &'static str {
        "GENERATED BY DEFAULT AS IDENTITY"
    }
}
