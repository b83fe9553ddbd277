//! Filter values and their translation into bound parameters.
//!
//! A filter is either `null` (IS NULL), a bare scalar (equality) or an
//! operator map. Operator maps are keyed by [`Operator`], so iteration always
//! follows the fixed `lt, lte, gt, gte, eq, ne, in, nin, like` order no matter
//! how the caller inserted them.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use super::types::{Operator, ParamValue};

/// A single typed filter operand.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterScalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

impl FilterScalar {
    /// Value bound to the query. Dates become ISO-8601 strings.
    pub fn bind(&self) -> ParamValue {
        match self {
            FilterScalar::Text(s) => ParamValue::Text(s.clone()),
            FilterScalar::Integer(i) => ParamValue::Integer(*i),
            FilterScalar::Float(f) => ParamValue::Float(*f),
            FilterScalar::Boolean(b) => ParamValue::Boolean(*b),
            FilterScalar::Date(d) => ParamValue::Text(d.format("%Y-%m-%d").to_string()),
            FilterScalar::DateTime(dt) => {
                ParamValue::Text(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
        }
    }
}

impl From<&str> for FilterScalar {
    fn from(value: &str) -> Self {
        FilterScalar::Text(value.to_string())
    }
}

impl From<String> for FilterScalar {
    fn from(value: String) -> Self {
        FilterScalar::Text(value)
    }
}

impl From<i64> for FilterScalar {
    fn from(value: i64) -> Self {
        FilterScalar::Integer(value)
    }
}

impl From<f64> for FilterScalar {
    fn from(value: f64) -> Self {
        FilterScalar::Float(value)
    }
}

impl From<bool> for FilterScalar {
    fn from(value: bool) -> Self {
        FilterScalar::Boolean(value)
    }
}

impl From<NaiveDate> for FilterScalar {
    fn from(value: NaiveDate) -> Self {
        FilterScalar::Date(value)
    }
}

impl From<DateTime<Utc>> for FilterScalar {
    fn from(value: DateTime<Utc>) -> Self {
        FilterScalar::DateTime(value)
    }
}

/// Operand of one operator: a single value, or a list for `in` / `nin`.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    One(FilterScalar),
    Many(Vec<FilterScalar>),
}

impl Operand {
    /// Bind for `op`. List operators always bind a list; other operators
    /// reject list operands.
    pub(crate) fn bind(&self, op: Operator) -> Option<ParamValue> {
        match (self, op.takes_list()) {
            (Operand::One(value), false) => Some(value.bind()),
            (Operand::One(value), true) => Some(ParamValue::List(vec![value.bind()])),
            (Operand::Many(values), true) => Some(ParamValue::List(
                values.iter().map(FilterScalar::bind).collect(),
            )),
            (Operand::Many(_), false) => None,
        }
    }
}

impl From<FilterScalar> for Operand {
    fn from(value: FilterScalar) -> Self {
        Operand::One(value)
    }
}

impl From<Vec<FilterScalar>> for Operand {
    fn from(values: Vec<FilterScalar>) -> Self {
        Operand::Many(values)
    }
}

/// Operators applied to one path, iterated in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatorMap(BTreeMap<Operator, Operand>);

impl OperatorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) a single-value operand.
    pub fn with(mut self, op: Operator, value: impl Into<FilterScalar>) -> Self {
        self.0.insert(op, Operand::One(value.into()));
        self
    }

    /// Set (or replace) a list operand.
    pub fn with_list(mut self, op: Operator, values: Vec<FilterScalar>) -> Self {
        self.0.insert(op, Operand::Many(values));
        self
    }

    pub fn insert(&mut self, op: Operator, operand: Operand) {
        self.0.insert(op, operand);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Operator, &Operand)> {
        self.0.iter().map(|(op, operand)| (*op, operand))
    }
}

impl IntoIterator for OperatorMap {
    type Item = (Operator, Operand);
    type IntoIter = std::collections::btree_map::IntoIter<Operator, Operand>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Value of one filter entry.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Matches rows where the field is NULL.
    Null,
    /// Equality.
    Scalar(FilterScalar),
    /// One predicate per operator.
    Operators(OperatorMap),
}

impl FilterValue {
    /// Equality filter.
    pub fn equals(value: impl Into<FilterScalar>) -> Self {
        FilterValue::Scalar(value.into())
    }
}

impl From<OperatorMap> for FilterValue {
    fn from(value: OperatorMap) -> Self {
        FilterValue::Operators(value)
    }
}
