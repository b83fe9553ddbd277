//! Field projection.
//!
//! This module provides:
//! - OptionSet / OptionMatching: caller-requested expansion paths
//! - Outbound projection: prunes response graphs per exposure rules
//! - Inbound sanitization: reduces write payloads to declared state

mod inbound;
mod options;
mod outbound;

use thiserror::Error;

use crate::convert::ConversionError;

pub use inbound::{sanitize, sanitize_into};
pub use options::{OptionMatching, OptionSet};
pub use outbound::{project, validate_options};

/// Errors raised by either projection direction.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// Option path is not declared as an allowed option on the root type.
    #[error("option '{option}' is not allowed for '{type_name}'")]
    OptionNotAllowed { option: String, type_name: String },

    /// An association value is not an object (or list of objects) with an id.
    #[error("relation '{path}' on '{type_name}' does not hold identifiable objects")]
    RelationShapeInvalid { path: String, type_name: String },

    /// Inbound association reference without an identifier.
    #[error("reference '{field}' must be an object with an id")]
    ReferenceInvalid { field: String },

    /// Inbound body is not a JSON object.
    #[error("request body must be a JSON object")]
    BodyInvalid,

    /// Inbound date value could not be coerced.
    #[error("field '{field}': {source}")]
    Conversion {
        field: String,
        #[source]
        source: ConversionError,
    },

    /// Sanitized value does not fit the requested type.
    #[error("request body does not match the expected shape: {0}")]
    Deserialize(#[from] serde_json::Error),

    /// Type is not registered in the relation graph.
    #[error("unknown type '{0}'")]
    UnknownType(String),
}
