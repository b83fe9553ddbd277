//! Relation graph module.
//!
//! This module provides:
//! - RelationGraph: immutable per-type relation and field metadata
//! - Declaration types: TypeDefinition, FieldDeclaration, ExposureClass, etc.
//! - Alias derivation for main and join aliases

mod alias;
mod registry;
pub mod types;

pub use alias::{join_alias, main_alias};
pub(crate) use registry::always_joined;
pub use registry::{GraphError, RelationGraph, RelationGraphBuilder};
pub use types::{
    Cardinality, ExposureClass, FetchMode, FieldDeclaration, FieldKind, FieldShape, JoinColumns,
    RelationDeclaration, ScalarType, TypeDefinition,
};
