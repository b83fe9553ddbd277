//! Join-aware query planning.
//!
//! This module provides:
//! - JoinRegistry: dotted path resolution with deterministic join aliases
//! - QueryPlanBuilder: filters, sort, paging and the automatic eager-join pass
//! - SqlRenderer: PostgreSQL statements for a plan (SeaQuery)
//! - EntityStore: the persistence collaborator, with a PostgreSQL implementation

mod error;
mod filter;
mod hydrate;
mod join_registry;
mod plan_builder;
mod sql;
mod store;
pub mod types;

pub use error::{PlanError, RenderError};
pub use filter::{FilterScalar, FilterValue, Operand, OperatorMap};
pub use hydrate::hydrate;
pub use join_registry::JoinRegistry;
pub use plan_builder::QueryPlanBuilder;
pub use sql::{SqlRenderer, render_insert};
pub use store::{EntityStore, PgEntityStore, PlanRows};
pub use types::{
    Accessor, Comparison, JoinEntry, NamedParam, Operator, ParamValue, Predicate, QueryPlan,
    SortClause, SortDirection,
};
