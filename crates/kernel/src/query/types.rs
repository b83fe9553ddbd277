//! Query plan types.
//!
//! A [`QueryPlan`] is the deterministic, dialect-neutral description of one
//! listing request: joins in registration order, AND-ed predicates in
//! insertion order, sort clauses in insertion order, then offset/limit.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::{Cardinality, JoinColumns};

/// Fully resolved reference to a field: `<alias>.<segment>...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accessor {
    /// Main alias or join alias.
    pub alias: String,
    /// Type owning the first segment.
    pub owner: String,
    /// Remaining path below the alias.
    pub segments: Vec<String>,
}

impl fmt::Display for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.alias)?;
        for segment in &self.segments {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}

/// A registered join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinEntry {
    /// Dotted relation path from the root (e.g. "orderLines.product").
    pub path: String,
    /// Deterministic alias (dots replaced by underscores).
    pub alias: String,
    /// Whether the joined row is selected (fetch join) or only filtered on.
    pub fetch_full: bool,
    /// Alias the join hangs off.
    pub parent_alias: String,
    /// Type owning `relative` (the parent alias' type).
    pub parent_type: String,
    /// Field path from the parent alias to the relation (more than one
    /// segment when the relation lives inside an embedded structure).
    pub relative: Vec<String>,
    pub target_type: String,
    pub cardinality: Cardinality,
    pub join: JoinColumns,
}

/// Comparison operators accepted in operator maps.
///
/// Declaration order is the order predicates are emitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Ne,
    In,
    Nin,
    Like,
}

impl Operator {
    /// SQL spelling of the operator.
    pub fn sql(self) -> &'static str {
        match self {
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::In => "IN",
            Operator::Nin => "NOT IN",
            Operator::Like => "LIKE",
        }
    }

    /// Parse the query-string key form (`gte`, `nin`, ...).
    pub fn parse(key: &str) -> Option<Self> {
        Some(match key {
            "lt" => Operator::Lt,
            "lte" => Operator::Lte,
            "gt" => Operator::Gt,
            "gte" => Operator::Gte,
            "eq" => Operator::Eq,
            "ne" => Operator::Ne,
            "in" => Operator::In,
            "nin" => Operator::Nin,
            "like" => Operator::Like,
            _ => return None,
        })
    }

    /// Query-string key form.
    pub fn key(self) -> &'static str {
        match self {
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::In => "in",
            Operator::Nin => "nin",
            Operator::Like => "like",
        }
    }

    /// Whether the operand is a list.
    pub fn takes_list(self) -> bool {
        matches!(self, Operator::In | Operator::Nin)
    }
}

/// Bound parameter value. Dates are already ISO-8601 text at this point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    List(Vec<ParamValue>),
}

/// Named parameter, unique within a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedParam {
    pub name: String,
    pub value: ParamValue,
}

/// What a predicate tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    IsNull,
    Op(Operator),
}

/// One predicate; all predicates of a plan are AND-ed.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub accessor: Accessor,
    pub comparison: Comparison,
    pub param: Option<NamedParam>,
}

impl Predicate {
    /// Dialect-neutral clause text, e.g. `order.total >= :value0`.
    pub fn clause(&self) -> String {
        match (&self.comparison, &self.param) {
            (Comparison::IsNull, _) => format!("{} IS NULL", self.accessor),
            (Comparison::Op(op), Some(param)) if op.takes_list() => {
                format!("{} {} (:{})", self.accessor, op.sql(), param.name)
            }
            (Comparison::Op(op), Some(param)) => {
                format!("{} {} :{}", self.accessor, op.sql(), param.name)
            }
            (Comparison::Op(op), None) => format!("{} {}", self.accessor, op.sql()),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Parse `asc` / `desc` (case-insensitive).
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("asc") {
            Some(SortDirection::Asc)
        } else if raw.eq_ignore_ascii_case("desc") {
            Some(SortDirection::Desc)
        } else {
            None
        }
    }
}

/// One ORDER BY entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SortClause {
    pub accessor: Accessor,
    pub direction: SortDirection,
}

/// Rendered plan handed to the persistence collaborator.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub root_type: String,
    pub main_alias: String,
    pub table: String,
    pub id_column: String,
    pub joins: Vec<JoinEntry>,
    pub predicates: Vec<Predicate>,
    pub sort: Vec<SortClause>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl QueryPlan {
    /// Join registered for `path`.
    pub fn join(&self, path: &str) -> Option<&JoinEntry> {
        self.joins.iter().find(|j| j.path == path)
    }

    /// Joins whose rows are selected.
    pub fn fetch_joins(&self) -> impl Iterator<Item = &JoinEntry> {
        self.joins.iter().filter(|j| j.fetch_full)
    }

    /// All named parameters in predicate order.
    pub fn params(&self) -> impl Iterator<Item = &NamedParam> {
        self.predicates.iter().filter_map(|p| p.param.as_ref())
    }

    /// Predicate clauses in insertion order.
    pub fn clauses(&self) -> Vec<String> {
        self.predicates.iter().map(Predicate::clause).collect()
    }
}
