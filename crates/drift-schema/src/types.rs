//! Closed tag sets shared by the desired and actual schema vocabularies.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Target database dialect.
///
/// The dialect governs how raw introspected type spellings and default
/// literals are canonicalized before comparison. It never changes *what* the
/// planner emits, only how equality is judged and how the DDL compiler spells
/// the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    /// PostgreSQL.
    Postgres,
    /// CockroachDB (Postgres wire-compatible, shares its spellings).
    CockroachDb,
    /// MySQL / MariaDB.
    Mysql,
    /// SQLite.
    Sqlite,
}

impl Dialect {
    /// Returns the lowercase dialect name used in messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::CockroachDb => "cockroachdb",
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Whether this engine ignores declared precision/scale on floating
    /// point columns. Postgres and CockroachDB store `float(n)` without the
    /// `n`, so comparing it would produce a perpetual false-positive diff.
    #[must_use]
    pub const fn ignores_float_precision(self) -> bool {
        matches!(self, Self::Postgres | Self::CockroachDb)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Semantic column type tag used by model declarations.
///
/// This is the dialect-neutral side of the type vocabulary; each tag maps to
/// one canonical name, the same namespace raw introspected spellings are
/// normalized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// 16-bit integer.
    SmallInt,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInt,
    /// Variable-length string with an optional declared length.
    Varchar,
    /// Fixed-length string.
    Char,
    /// Unbounded text.
    Text,
    /// Boolean.
    Boolean,
    /// Single-precision float.
    Real,
    /// Double-precision float.
    Double,
    /// Exact decimal with precision/scale.
    Decimal,
    /// Date only.
    Date,
    /// Time only.
    Time,
    /// Date and time; the column spec's timezone flag distinguishes
    /// `timestamptz` from plain `timestamp`.
    Timestamp,
    /// JSON document (textual).
    Json,
    /// Binary JSON (Postgres `jsonb`).
    Jsonb,
    /// UUID.
    Uuid,
    /// Binary data.
    Blob,
}

impl ColumnType {
    /// Returns the canonical lowercase name shared with the type normalizer.
    #[must_use]
    pub const fn canonical_name(self) -> &'static str {
        match self {
            Self::SmallInt => "smallint",
            Self::Integer => "integer",
            Self::BigInt => "bigint",
            Self::Varchar => "varchar",
            Self::Char => "char",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Real => "real",
            Self::Double => "double",
            Self::Decimal => "decimal",
            Self::Date => "date",
            Self::Time => "time",
            Self::Timestamp => "timestamp",
            Self::Json => "json",
            Self::Jsonb => "jsonb",
            Self::Uuid => "uuid",
            Self::Blob => "blob",
        }
    }

    /// Whether this is a floating-point type subject to the precision
    /// tolerance on engines reported by [`Dialect::ignores_float_precision`].
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Real | Self::Double)
    }

    /// Whether defaults of this type are JSON documents and compare
    /// structurally rather than textually.
    #[must_use]
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json | Self::Jsonb)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Referential action for `ON DELETE` / `ON UPDATE` clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ReferentialAction {
    /// No action (deferred check).
    #[default]
    NoAction,
    /// Restrict (immediate check).
    Restrict,
    /// Cascade to referencing rows.
    Cascade,
    /// Set the referencing column to NULL.
    SetNull,
    /// Set the referencing column to its default.
    SetDefault,
}

impl ReferentialAction {
    /// Returns the SQL spelling of this action.
    #[must_use]
    pub const fn to_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    /// Parses an introspected action spelling, case-insensitively.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "NO ACTION" => Some(Self::NoAction),
            "RESTRICT" => Some(Self::Restrict),
            "CASCADE" => Some(Self::Cascade),
            "SET NULL" => Some(Self::SetNull),
            "SET DEFAULT" => Some(Self::SetDefault),
            _ => None,
        }
    }

    /// Case-insensitive equality against an introspected spelling.
    #[must_use]
    pub fn matches(self, raw: &str) -> bool {
        Self::parse(raw) == Some(self)
    }
}
