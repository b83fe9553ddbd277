//! List request binding.
//!
//! Turns raw query-string pairs into typed list parameters:
//! - `page` / `size`: kept raw for window parsing
//! - `sort`: repeatable `field` or `field,asc|desc`
//! - `options`: comma-separated option paths
//! - anything else: a filter, `field=value` or `field[op]=value`

use thiserror::Error;

use crate::convert::{self, ConversionError};
use crate::graph::{FieldKind, RelationGraph, ScalarType};
use crate::projection::OptionSet;
use crate::query::types::{Operator, SortDirection};
use crate::query::{FilterScalar, FilterValue, Operand, OperatorMap};

/// Literal that filters on `IS NULL`.
const NULL_LITERAL: &str = "null";

/// Rejected list request parameter.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("sort parameter '{0}' must be 'field' or 'field,asc|desc'")]
    SortMalformed(String),

    #[error("unknown filter operator in '{0}'")]
    OperatorInvalid(String),

    #[error("filter '{field}': {source}")]
    TypeMismatch {
        field: String,
        #[source]
        source: ConversionError,
    },
}

impl RequestError {
    pub fn code(&self) -> &'static str {
        match self {
            RequestError::SortMalformed(_) => "sort.malformed",
            RequestError::OperatorInvalid(_) => "filter.operator.invalid",
            RequestError::TypeMismatch { .. } => "type.mismatch",
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            RequestError::SortMalformed(_) => Some("sort"),
            RequestError::OperatorInvalid(key) => Some(key),
            RequestError::TypeMismatch { field, .. } => Some(field),
        }
    }
}

/// Bound list parameters.
#[derive(Debug, Default)]
pub struct ListParams {
    pub page: Option<String>,
    pub size: Option<String>,
    pub sort: Vec<(String, SortDirection)>,
    pub options: OptionSet,
    /// Filters per field path, in order of first appearance.
    pub filters: Vec<(String, FilterValue)>,
}

impl ListParams {
    /// Bind raw pairs against `type_name`.
    ///
    /// Filter values are typed from the declared scalar type of the field they
    /// target. Paths the graph does not know stay text and are rejected later
    /// by the plan builder.
    pub fn bind<I, K, V>(
        graph: &RelationGraph,
        type_name: &str,
        pairs: I,
    ) -> Result<Self, RequestError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = ListParams::default();

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "page" => params.page = Some(value.to_string()),
                "size" => params.size = Some(value.to_string()),
                "options" => params.options.extend_from(value),
                "sort" => params.sort.push(parse_sort(value)?),
                _ => {
                    let (path, operator) = split_filter_key(key)?;
                    let scalar = filter_type(graph, type_name, path);
                    params.add_filter(path, operator, value, scalar)?;
                }
            }
        }

        Ok(params)
    }

    /// Options only, for single-entity reads.
    pub fn options_only<I, K, V>(pairs: I) -> OptionSet
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = OptionSet::default();
        for (key, value) in pairs {
            if key.as_ref() == "options" {
                options.extend_from(value.as_ref());
            }
        }
        options
    }

    fn add_filter(
        &mut self,
        path: &str,
        operator: Option<Operator>,
        raw: &str,
        scalar: ScalarType,
    ) -> Result<(), RequestError> {
        let typed = |raw: &str| {
            typed_scalar(scalar, raw).map_err(|source| RequestError::TypeMismatch {
                field: path.to_string(),
                source,
            })
        };

        let value = match operator {
            None if raw == NULL_LITERAL => FilterValue::Null,
            None => FilterValue::Scalar(typed(raw)?),
            Some(op) => {
                let operand = if op.takes_list() {
                    Operand::Many(
                        raw.split(',')
                            .filter(|s| !s.is_empty())
                            .map(typed)
                            .collect::<Result<_, _>>()?,
                    )
                } else {
                    Operand::One(typed(raw)?)
                };
                let mut map = OperatorMap::new();
                map.insert(op, operand);
                FilterValue::Operators(map)
            }
        };

        match self.filters.iter_mut().find(|(p, _)| p == path) {
            Some((_, existing)) => merge(existing, value),
            None => self.filters.push((path.to_string(), value)),
        }
        Ok(())
    }
}

/// Fold a repeated filter on the same path into one operator map.
fn merge(existing: &mut FilterValue, incoming: FilterValue) {
    let as_map = |value: FilterValue| match value {
        FilterValue::Operators(map) => Some(map),
        FilterValue::Scalar(scalar) => {
            let mut map = OperatorMap::new();
            map.insert(Operator::Eq, Operand::One(scalar));
            Some(map)
        }
        FilterValue::Null => None,
    };

    let current = std::mem::replace(existing, FilterValue::Null);
    *existing = match (as_map(current), as_map(incoming)) {
        (Some(mut map), Some(other)) => {
            for (op, operand) in other {
                map.insert(op, operand);
            }
            FilterValue::Operators(map)
        }
        // IS NULL cannot be combined with comparisons; the latest value wins.
        (_, Some(other)) => FilterValue::Operators(other),
        (_, None) => FilterValue::Null,
    };
}

fn parse_sort(raw: &str) -> Result<(String, SortDirection), RequestError> {
    let malformed = || RequestError::SortMalformed(raw.to_string());
    let mut parts = raw.split(',');
    let field = parts.next().filter(|f| !f.is_empty()).ok_or_else(malformed)?;
    let direction = match parts.next() {
        None => SortDirection::Asc,
        Some(dir) => SortDirection::parse(dir).ok_or_else(malformed)?,
    };
    if parts.next().is_some() {
        return Err(malformed());
    }
    Ok((field.to_string(), direction))
}

/// Split `field[op]` into the path and the operator.
fn split_filter_key(key: &str) -> Result<(&str, Option<Operator>), RequestError> {
    let Some(open) = key.find('[') else {
        return Ok((key, None));
    };
    let invalid = || RequestError::OperatorInvalid(key.to_string());
    let op = key[open + 1..].strip_suffix(']').ok_or_else(invalid)?;
    let op = Operator::parse(op).ok_or_else(invalid)?;
    Ok((&key[..open], Some(op)))
}

/// Scalar type a filter on `path` compares against.
///
/// A relation compares its target's identifier.
fn filter_type(graph: &RelationGraph, type_name: &str, path: &str) -> ScalarType {
    let Some((_, field)) = graph.field_at_path(type_name, path) else {
        return ScalarType::Text;
    };
    match &field.kind {
        FieldKind::Scalar { scalar } => *scalar,
        FieldKind::Relation { target, .. } => target
            .as_deref()
            .and_then(|t| graph.get(t))
            .and_then(|t| t.get(&t.id_field))
            .and_then(|id| match id.kind {
                FieldKind::Scalar { scalar } => Some(scalar),
                _ => None,
            })
            .unwrap_or_default(),
        FieldKind::Embedded { .. } => ScalarType::Text,
    }
}

fn typed_scalar(scalar: ScalarType, raw: &str) -> Result<FilterScalar, ConversionError> {
    Ok(match scalar {
        ScalarType::Integer => FilterScalar::Integer(convert::to_int(raw)?),
        ScalarType::Float => FilterScalar::Float(convert::to_float(raw)?),
        ScalarType::Boolean => FilterScalar::Boolean(convert::to_bool(raw)?),
        ScalarType::Date => FilterScalar::Date(convert::to_date(raw)?),
        ScalarType::Datetime => FilterScalar::DateTime(convert::to_datetime(raw)?),
        ScalarType::Uuid => FilterScalar::Text(convert::to_uuid(raw)?.to_string()),
        ScalarType::Text | ScalarType::Json => FilterScalar::Text(raw.to_string()),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::graph::{Cardinality, FieldDeclaration, TypeDefinition};

    fn graph() -> RelationGraph {
        RelationGraph::builder()
            .register(
                TypeDefinition::entity("OrderBE", "orders")
                    .field(FieldDeclaration::scalar("id", ScalarType::Integer))
                    .field(FieldDeclaration::scalar("status", ScalarType::Text))
                    .field(FieldDeclaration::scalar("total", ScalarType::Float))
                    .field(FieldDeclaration::embedded("deliveryData", "DeliveryData"))
                    .field(FieldDeclaration::relation(
                        "customer",
                        "CustomerBE",
                        Cardinality::One,
                        "customer_id",
                        "id",
                    )),
            )
            .register(
                TypeDefinition::embeddable("DeliveryData")
                    .field(FieldDeclaration::scalar("deliveryDate", ScalarType::Date)),
            )
            .register(
                TypeDefinition::entity("CustomerBE", "customers")
                    .field(FieldDeclaration::scalar("id", ScalarType::Integer)),
            )
            .build()
            .unwrap()
    }

    fn bind(pairs: &[(&str, &str)]) -> Result<ListParams, RequestError> {
        ListParams::bind(&graph(), "OrderBE", pairs.iter().copied())
    }

    #[test]
    fn reserved_keys_are_not_filters() {
        let params = bind(&[
            ("page", "2"),
            ("size", "5"),
            ("options", "orderLines,customer"),
            ("options", "orderLines.product"),
            ("sort", "status,desc"),
            ("sort", "id"),
        ])
        .unwrap();

        assert_eq!(params.page.as_deref(), Some("2"));
        assert_eq!(params.size.as_deref(), Some("5"));
        assert_eq!(
            params.options.as_slice(),
            ["orderLines", "customer", "orderLines.product"]
        );
        assert_eq!(
            params.sort,
            vec![
                ("status".to_string(), SortDirection::Desc),
                ("id".to_string(), SortDirection::Asc),
            ]
        );
        assert!(params.filters.is_empty());
    }

    #[test]
    fn malformed_sort_is_rejected() {
        for raw in ["", "status,sideways", "status,asc,extra", ",asc"] {
            let err = bind(&[("sort", raw)]).unwrap_err();
            assert_eq!(err.code(), "sort.malformed", "{raw}");
        }
    }

    #[test]
    fn filters_are_typed_from_the_graph() {
        let params = bind(&[
            ("status", "open"),
            ("total[gte]", "9.5"),
            ("customer", "7"),
            ("deliveryData.deliveryDate[lte]", "2024-03-01"),
            ("id[in]", "1,2,3"),
        ])
        .unwrap();

        let expected = vec![
            ("status".to_string(), FilterValue::equals("open")),
            (
                "total".to_string(),
                FilterValue::Operators(OperatorMap::new().with(Operator::Gte, 9.5)),
            ),
            ("customer".to_string(), FilterValue::equals(7i64)),
            (
                "deliveryData.deliveryDate".to_string(),
                FilterValue::Operators(
                    OperatorMap::new()
                        .with(Operator::Lte, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
                ),
            ),
            (
                "id".to_string(),
                FilterValue::Operators(OperatorMap::new().with_list(
                    Operator::In,
                    vec![1i64.into(), 2i64.into(), 3i64.into()],
                )),
            ),
        ];
        assert_eq!(params.filters, expected);
    }

    #[test]
    fn repeated_paths_merge_into_one_map() {
        let params = bind(&[
            ("deliveryData.deliveryDate[gte]", "2024-01-01"),
            ("deliveryData.deliveryDate[lte]", "2024-12-31"),
        ])
        .unwrap();

        assert_eq!(params.filters.len(), 1);
        let FilterValue::Operators(map) = &params.filters[0].1 else {
            panic!("expected operator map");
        };
        let ops: Vec<Operator> = map.iter().map(|(op, _)| op).collect();
        assert_eq!(ops, vec![Operator::Lte, Operator::Gte]);
    }

    #[test]
    fn null_literal_filters_on_absence() {
        let params = bind(&[("customer", "null")]).unwrap();
        assert_eq!(params.filters[0].1, FilterValue::Null);
    }

    #[test]
    fn bad_operator_and_bad_value() {
        assert_eq!(
            bind(&[("status[between]", "a")]).unwrap_err().code(),
            "filter.operator.invalid"
        );
        assert_eq!(
            bind(&[("status[eq", "a")]).unwrap_err().code(),
            "filter.operator.invalid"
        );

        let err = bind(&[("total[gt]", "lots")]).unwrap_err();
        assert_eq!(err.code(), "type.mismatch");
        assert_eq!(err.field(), Some("total"));
    }

    #[test]
    fn unknown_paths_stay_text() {
        let params = bind(&[("bogus", "1")]).unwrap();
        assert_eq!(
            params.filters[0].1,
            FilterValue::Scalar(FilterScalar::Text("1".into()))
        );
    }
}
