//! Query planning errors.

use thiserror::Error;

/// Errors raised while building a query plan.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    /// Filter or sort path does not name a declared field.
    #[error("field '{field}' is not valid for entity '{entity}'")]
    FieldInvalid { field: String, entity: String },

    /// Included relations re-enter a type already on the join chain.
    #[error("relation cycle detected at '{path}'")]
    RelationCycle { path: String },

    /// A list operand was given to a single-value operator.
    #[error("operator '{operator}' on '{field}' does not accept a list")]
    OperandInvalid {
        field: String,
        operator: &'static str,
    },

    /// Root type is not registered or has no table.
    #[error("'{0}' is not a queryable entity")]
    NotQueryable(String),
}

impl PlanError {
    pub(crate) fn field_invalid(field: &str, entity: &str) -> Self {
        PlanError::FieldInvalid {
            field: field.to_string(),
            entity: entity.to_string(),
        }
    }
}

/// Errors raised while rendering a plan into SQL. These indicate a graph or
/// plan that should never have been built.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unsafe SQL identifier '{0}'")]
    UnsafeIdentifier(String),

    #[error("type '{0}' is not registered")]
    UnknownType(String),

    #[error("field '{field}' is not declared on '{type_name}'")]
    UnknownField { type_name: String, field: String },

    #[error("failed to build statement: {0}")]
    Statement(#[from] sea_query::error::Error),
}
