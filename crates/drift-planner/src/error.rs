//! Error types for the planning core.

use drift_schema::Dialect;

use crate::graph::NodeId;

/// Errors that can abort plan generation.
///
/// Any error means "nothing to apply": the planner never hands a truncated
/// operation list to its caller.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// The drop-dependency graph contains a cycle.
    #[error("Circular dependency detected: {0}")]
    CircularDependency(NodeId),

    /// A raw type spelling has no canonical form for the dialect. The
    /// planner never guesses a type mapping.
    #[error("unsupported column type '{ty}' for dialect {dialect}")]
    UnsupportedType {
        /// Dialect the spelling was introspected from.
        dialect: Dialect,
        /// The offending raw spelling.
        ty: String,
    },

    /// The DDL compiler cannot express an operation for its dialect.
    #[error("dialect {dialect} cannot express {operation}")]
    UnsupportedOperation {
        /// The compiler's dialect.
        dialect: Dialect,
        /// Description of the rejected operation.
        operation: String,
    },

    /// An introspection query failed. The underlying error is passed
    /// through unchanged from the introspector implementation.
    #[error("introspection failed for table '{table}': {source}")]
    Introspection {
        /// Table whose schema was being fetched.
        table: String,
        /// The introspector's own error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl PlanError {
    /// Wraps an introspector error for the given table.
    pub fn introspection(
        table: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Introspection {
            table: table.into(),
            source: source.into(),
        }
    }
}

/// Result type for planning operations.
pub type Result<T> = std::result::Result<T, PlanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_names_the_node() {
        let err = PlanError::CircularDependency(NodeId::table("users"));
        assert_eq!(err.to_string(), "Circular dependency detected: table.users");
    }

    #[test]
    fn test_unsupported_type_message() {
        let err = PlanError::UnsupportedType {
            dialect: Dialect::Postgres,
            ty: "hstore".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unsupported column type 'hstore' for dialect postgres"
        );
    }
}
