//! Type-spelling and default-literal canonicalization.
//!
//! Model declarations are dialect-neutral while introspection reports
//! dialect-specific spellings (`int4`, `character varying`, `'{}'::jsonb`).
//! Everything in this module maps both sides into one canonical vocabulary
//! so that equal concepts compare equal and nothing else does.
//!
//! Two deliberate tolerances, both one-way:
//!
//! - precision/scale on floating-point columns is ignored on engines that do
//!   not store it ([`Dialect::ignores_float_precision`]);
//! - JSON defaults compare structurally, not textually.
//!
//! Normalization is therefore not injective. That is the point: the differ
//! must never report drift the database cannot actually express.

use drift_schema::{ColumnSpec, Dialect, TableColumnInfo};
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};

/// Direction of a default-value change between model and database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultChange {
    /// The model declares a default the database lacks or spells differently.
    Set,
    /// The database has a default the model no longer declares.
    Drop,
}

/// Canonicalizes a raw column type spelling for the dialect.
///
/// Strips length/precision argument syntax and collapses alias spellings
/// onto the canonical names shared with
/// [`drift_schema::ColumnType::canonical_name`].
///
/// # Errors
///
/// Returns [`PlanError::UnsupportedType`] for a spelling with no known
/// canonical form; the planner never guesses a type mapping.
pub fn normalize_column_type(dialect: Dialect, raw: &str) -> Result<String> {
    let lowered = raw.trim().to_ascii_lowercase();

    // MySQL idiom: tinyint(1) is a boolean, every other tinyint width is a
    // small integer. Decided before the argument syntax is stripped.
    if dialect == Dialect::Mysql && lowered == "tinyint(1)" {
        return Ok("boolean".to_string());
    }

    let base = match lowered.split_once('(') {
        Some((base, _)) => base.trim_end(),
        None => lowered.as_str(),
    };

    let canonical = match base {
        "int" | "int4" | "integer" | "mediumint" | "serial" => "integer",
        "int8" | "bigint" | "bigserial" => "bigint",
        "int2" | "smallint" | "smallserial" | "tinyint" => "smallint",
        "varchar" | "nvarchar" | "character varying" | "varying character" => "varchar",
        "char" | "nchar" | "bpchar" | "character" => "char",
        "text" | "clob" | "tinytext" | "mediumtext" | "longtext" => "text",
        "bool" | "boolean" => "boolean",
        "real" | "float4" => "real",
        "double" | "double precision" | "float8" | "float" => "double",
        "decimal" | "dec" | "numeric" => "decimal",
        "date" => "date",
        "time" | "timetz" | "time with time zone" | "time without time zone" => "time",
        "timestamp"
        | "timestamptz"
        | "timestamp with time zone"
        | "timestamp without time zone"
        | "datetime" => "timestamp",
        "json" => "json",
        "jsonb" => "jsonb",
        "uuid" => "uuid",
        "bytea" | "blob" | "binary" | "varbinary" | "tinyblob" | "mediumblob" | "longblob" => {
            "blob"
        }
        _ => {
            return Err(PlanError::UnsupportedType {
                dialect,
                ty: raw.trim().to_string(),
            })
        }
    };

    Ok(canonical.to_string())
}

/// Canonicalizes a default-value literal.
///
/// Strips balanced surrounding parentheses and `::type` cast suffixes,
/// unwraps single-quoted string literals, canonicalizes boolean and NULL
/// spellings, and re-serializes JSON defaults so whitespace and key order
/// never register as drift.
#[must_use]
pub fn normalize_default_value(dialect: Dialect, canonical_type: &str, raw: &str) -> String {
    let mut value = raw.trim().to_string();

    // Casts and wrapping parentheses can nest (`('0'::integer)`), so peel
    // until a fixed point.
    loop {
        let before = value.clone();
        value = strip_outer_parens(&value);
        value = strip_cast_suffix(&value);
        value = value.trim().to_string();
        if value == before {
            break;
        }
    }

    if let Some(inner) = unwrap_single_quotes(&value) {
        value = inner;
    }

    match canonical_type {
        "boolean" => {
            let lowered = value.to_ascii_lowercase();
            match lowered.as_str() {
                "true" | "t" | "yes" | "on" => return "true".to_string(),
                "false" | "f" | "no" | "off" => return "false".to_string(),
                // MySQL and SQLite report boolean defaults numerically.
                "1" if dialect != Dialect::Postgres => return "true".to_string(),
                "0" if dialect != Dialect::Postgres => return "false".to_string(),
                _ => {}
            }
        }
        "json" | "jsonb" => {
            if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&value) {
                // serde_json's default map is ordered, so this yields one
                // canonical text per document regardless of key order.
                if let Ok(compact) = serde_json::to_string(&parsed) {
                    return compact;
                }
            }
        }
        _ => {}
    }

    if value.eq_ignore_ascii_case("null") {
        return "null".to_string();
    }

    value
}

/// Removes one layer of parentheses when the opening paren's match is the
/// final character.
fn strip_outer_parens(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.first() != Some(&b'(') || bytes.last() != Some(&b')') {
        return value.to_string();
    }

    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    if i == bytes.len() - 1 {
                        return value[1..bytes.len() - 1].trim().to_string();
                    }
                    return value.to_string();
                }
            }
            _ => {}
        }
    }
    value.to_string()
}

/// Truncates a Postgres `::type` cast suffix, respecting quoted literals.
fn strip_cast_suffix(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut in_quote = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_quote = !in_quote,
            b':' if !in_quote && i + 1 < bytes.len() && bytes[i + 1] == b':' => {
                return value[..i].trim_end().to_string();
            }
            _ => {}
        }
        i += 1;
    }
    value.to_string()
}

/// Unwraps `'literal'`, un-escaping doubled quotes. Returns `None` when the
/// value is not a quoted literal.
fn unwrap_single_quotes(value: &str) -> Option<String> {
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        Some(value[1..value.len() - 1].replace("''", "'"))
    } else {
        None
    }
}

/// Compares a declared column against its introspected counterpart.
///
/// Type, length, precision/scale, timezone flag and nullability must all
/// agree, with two carve-outs: a model that leaves length/precision
/// undeclared accepts whatever the database reports, and floating-point
/// precision is ignored entirely on engines that do not store it.
///
/// Defaults are compared separately by [`default_change`].
///
/// # Errors
///
/// Propagates [`PlanError::UnsupportedType`] from type normalization.
pub fn columns_equal(dialect: Dialect, model: &ColumnSpec, actual: &TableColumnInfo) -> Result<bool> {
    let model_type = model.column_type.canonical_name();
    let actual_type = normalize_column_type(dialect, &actual.data_type)?;
    if model_type != actual_type {
        return Ok(false);
    }

    if model.length.is_some() && model.length != actual.length {
        return Ok(false);
    }

    let skip_precision = model.column_type.is_float() && dialect.ignores_float_precision();
    if !skip_precision {
        if model.precision.is_some() && model.precision != actual.precision {
            return Ok(false);
        }
        if model.scale.is_some() && model.scale != actual.scale {
            return Ok(false);
        }
    }

    if model.timezone != actual.timezone {
        return Ok(false);
    }

    if model.nullable != actual.nullable {
        return Ok(false);
    }

    Ok(true)
}

/// Detects a default-value change between model and database.
///
/// Returns `None` when the normalized defaults agree. Auto-increment columns
/// are exempt: their sequence-backed catalog defaults (`nextval(…)`) are an
/// implementation artifact, not declared drift.
#[must_use]
pub fn default_change(
    dialect: Dialect,
    model: &ColumnSpec,
    actual: &TableColumnInfo,
) -> Option<DefaultChange> {
    if model.auto_increment {
        return None;
    }

    let canonical_type = model.column_type.canonical_name();
    let model_default = model
        .default
        .as_deref()
        .map(|raw| normalize_default_value(dialect, canonical_type, raw));
    let actual_default = actual
        .default_value
        .as_deref()
        .map(|raw| normalize_default_value(dialect, canonical_type, raw));

    match (model_default, actual_default) {
        (Some(m), Some(a)) if m == a => None,
        (Some(_), _) => Some(DefaultChange::Set),
        (None, Some(_)) => Some(DefaultChange::Drop),
        (None, None) => None,
    }
}
