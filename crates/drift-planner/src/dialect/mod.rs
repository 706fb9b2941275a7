//! Dialect-specific DDL rendering.
//!
//! The planner decides *what* happens and in *which order*; a [`DdlCompiler`]
//! only spells it. Compilers never reorder, merge, or suppress operations.

mod postgres;

pub use postgres::PostgresDdl;

use drift_schema::ColumnSpec;

use crate::error::Result;
use crate::ops::OperationKind;

/// Trait for database-specific DDL generation.
pub trait DdlCompiler: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Renders the SQL statements for one operation, in execution order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PlanError::UnsupportedOperation`] when the dialect
    /// cannot express the operation, or
    /// [`crate::PlanError::UnsupportedType`] for a type it cannot spell.
    fn statements(&self, operation: &OperationKind) -> Result<Vec<String>>;

    /// Returns the SQL type spelling for a column declaration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PlanError::UnsupportedType`] when the dialect has no
    /// spelling for the column's type.
    fn type_name(&self, column: &ColumnSpec) -> Result<String>;

    /// Returns the clause that makes a column auto-incrementing.
    fn auto_increment_clause(&self) -> &'static str;

    /// Quotes an identifier (table name, column name, constraint name).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{name}\"")
    }

    /// Renders one column definition for CREATE TABLE / ADD COLUMN.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::type_name`] failures.
    fn column_definition(&self, column: &ColumnSpec) -> Result<String> {
        let mut parts = vec![
            self.quote_identifier(&column.db_name),
            self.type_name(column)?,
        ];

        if column.auto_increment {
            parts.push(self.auto_increment_clause().to_string());
        }

        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }

        if !column.auto_increment {
            if let Some(default) = &column.default {
                parts.push(format!("DEFAULT {default}"));
            }
        }

        Ok(parts.join(" "))
    }
}
