//! Actual-side schema as recovered by a live-database introspector.
//!
//! These types carry dialect-specific spellings exactly as the catalog
//! reports them (`int4`, `timestamptz`, `nextval('…')`, …); the planner's
//! normalizer is responsible for mapping them into the canonical vocabulary
//! before any comparison.

use serde::{Deserialize, Serialize};

/// One column as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumnInfo {
    /// Column name.
    pub name: String,
    /// Raw type spelling, e.g. `int4` or `character varying`.
    pub data_type: String,
    /// Declared character length, if any.
    pub length: Option<u32>,
    /// Numeric precision, if any.
    pub precision: Option<u32>,
    /// Numeric scale, if any.
    pub scale: Option<u32>,
    /// Whether the temporal type carries a timezone.
    pub timezone: bool,
    /// Whether the column allows NULL.
    pub nullable: bool,
    /// Raw default literal, if any.
    pub default_value: Option<String>,
    /// Whether the column is part of the primary key.
    pub primary_key: bool,
}

impl TableColumnInfo {
    /// Creates a column info with the given raw type, everything else at
    /// its introspected defaults.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            length: None,
            precision: None,
            scale: None,
            timezone: false,
            nullable: true,
            default_value: None,
            primary_key: false,
        }
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

    /// Flags a timezone-aware temporal column.
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

    /// Sets the raw default literal.
    #[must_use]
    pub fn default_value(mut self, literal: impl Into<String>) -> Self {
        self.default_value = Some(literal.into());
        self
    }

    /// Marks the column as part of the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }
}

/// One index as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableIndexInfo {
    /// Index name.
    pub name: String,
    /// Indexed columns, in order.
    pub columns: Vec<String>,
    /// Whether the index is unique.
    pub unique: bool,
}

impl TableIndexInfo {
    /// Creates an index info.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<String>, unique: bool) -> Self {
        Self {
            name: name.into(),
            columns,
            unique,
        }
    }
}

/// One foreign key as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableForeignKeyInfo {
    /// Constraint name.
    pub constraint_name: String,
    /// Referencing column on this table.
    pub column: String,
    /// Referenced table.
    pub referenced_table: String,
    /// Referenced column.
    pub referenced_column: String,
    /// Raw ON DELETE spelling, if reported.
    pub on_delete: Option<String>,
    /// Raw ON UPDATE spelling, if reported.
    pub on_update: Option<String>,
}

impl TableForeignKeyInfo {
    /// Creates a foreign key info.
    #[must_use]
    pub fn new(
        constraint_name: impl Into<String>,
        column: impl Into<String>,
        referenced_table: impl Into<String>,
        referenced_column: impl Into<String>,
    ) -> Self {
        Self {
            constraint_name: constraint_name.into(),
            column: column.into(),
            referenced_table: referenced_table.into(),
            referenced_column: referenced_column.into(),
            on_delete: None,
            on_update: None,
        }
    }

    /// Sets the raw ON DELETE spelling.
    #[must_use]
    pub fn on_delete(mut self, action: impl Into<String>) -> Self {
        self.on_delete = Some(action.into());
        self
    }

    /// Sets the raw ON UPDATE spelling.
    #[must_use]
    pub fn on_update(mut self, action: impl Into<String>) -> Self {
        self.on_update = Some(action.into());
        self
    }
}

/// The primary key as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePrimaryKeyInfo {
    /// Constraint name, when the catalog reports one.
    pub constraint_name: Option<String>,
    /// Key columns, in order.
    pub columns: Vec<String>,
}

impl TablePrimaryKeyInfo {
    /// Creates a primary key info.
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            constraint_name: None,
            columns,
        }
    }

    /// Sets the constraint name.
    #[must_use]
    pub fn constraint_name(mut self, name: impl Into<String>) -> Self {
        self.constraint_name = Some(name.into());
        self
    }
}

/// Everything the introspector reports about one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSchemaInfo {
    /// Columns, in ordinal order.
    pub columns: Vec<TableColumnInfo>,
    /// Indexes, including unique indexes backing unique constraints.
    pub indexes: Vec<TableIndexInfo>,
    /// Foreign keys.
    pub foreign_keys: Vec<TableForeignKeyInfo>,
    /// Primary key, if any.
    pub primary_key: Option<TablePrimaryKeyInfo>,
}

impl TableSchemaInfo {
    /// Creates an empty table info.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: TableColumnInfo) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: TableIndexInfo) -> Self {
        self.indexes.push(index);
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, fk: TableForeignKeyInfo) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Sets the primary key.
    #[must_use]
    pub fn primary_key(mut self, pk: TablePrimaryKeyInfo) -> Self {
        self.primary_key = Some(pk);
        self
    }

    /// Finds a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&TableColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Finds an index by name.
    #[must_use]
    pub fn get_index(&self, name: &str) -> Option<&TableIndexInfo> {
        self.indexes.iter().find(|i| i.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_info_builder() {
        let col = TableColumnInfo::new("created_at", "timestamptz")
            .with_timezone()
            .not_null()
            .default_value("now()");

        assert_eq!(col.data_type, "timestamptz");
        assert!(col.timezone);
        assert!(!col.nullable);
        assert_eq!(col.default_value.as_deref(), Some("now()"));
    }

    #[test]
    fn test_table_info_lookup() {
        let info = TableSchemaInfo::new()
            .column(TableColumnInfo::new("id", "int8").primary_key())
            .index(TableIndexInfo::new(
                "users_email_key",
                vec!["email".to_string()],
                true,
            ))
            .primary_key(TablePrimaryKeyInfo::new(vec!["id".to_string()]).constraint_name("users_pkey"));

        assert!(info.get_column("id").is_some());
        assert!(info.get_index("users_email_key").is_some());
        assert_eq!(
            info.primary_key.as_ref().and_then(|pk| pk.constraint_name.as_deref()),
            Some("users_pkey")
        );
    }
}
