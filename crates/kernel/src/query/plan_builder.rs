//! Query plan builder.
//!
//! Accumulates joins, predicates, sort clauses and offset/limit for a single
//! listing request. A builder is created per request and consumed by
//! [`QueryPlanBuilder::build`].

use tracing::debug;

use crate::graph::{FieldKind, RelationGraph, TypeDefinition, always_joined};

use super::error::PlanError;
use super::filter::FilterValue;
use super::join_registry::JoinRegistry;
use super::types::{
    Comparison, NamedParam, Operator, ParamValue, Predicate, QueryPlan, SortClause,
    SortDirection,
};

/// One type on the eager walk's current branch, and whether the field that
/// entered it is walked regardless of options.
struct ChainLink<'g> {
    type_name: &'g str,
    unconditional: bool,
}

/// Builder for one [`QueryPlan`].
#[derive(Debug)]
pub struct QueryPlanBuilder<'g> {
    graph: &'g RelationGraph,
    root: &'g TypeDefinition,
    joins: JoinRegistry<'g>,
    predicates: Vec<Predicate>,
    sort: Vec<SortClause>,
    offset: Option<u64>,
    limit: Option<u64>,
    next_param: usize,
}

impl<'g> QueryPlanBuilder<'g> {
    /// Start a plan rooted at `type_name`, which must be an entity.
    pub fn new(graph: &'g RelationGraph, type_name: &str) -> Result<Self, PlanError> {
        let root = graph
            .get(type_name)
            .filter(|def| def.is_entity())
            .ok_or_else(|| PlanError::NotQueryable(type_name.to_string()))?;

        Ok(Self {
            graph,
            root,
            joins: JoinRegistry::new(graph, root),
            predicates: Vec::new(),
            sort: Vec::new(),
            offset: None,
            limit: None,
            next_param: 0,
        })
    }

    pub fn main_alias(&self) -> &str {
        self.joins.main_alias()
    }

    /// Register fetch joins for every relation that is always loaded or that a
    /// caller option reaches.
    ///
    /// Run once per request, before any filter. Re-entering a type already on
    /// the current chain is fine while an option bounds the walk; fails with
    /// [`PlanError::RelationCycle`] when everything since the earlier visit is
    /// walked unconditionally, since that would never end.
    pub fn with_eager_joins(&mut self, options: &[String]) -> Result<&mut Self, PlanError> {
        let root = self.root;
        let mut chain = vec![ChainLink {
            type_name: root.name.as_str(),
            unconditional: false,
        }];
        self.walk_eager(root, "", &mut chain, options)?;
        Ok(self)
    }

    fn walk_eager(
        &mut self,
        def: &'g TypeDefinition,
        prefix: &str,
        chain: &mut Vec<ChainLink<'g>>,
        options: &[String],
    ) -> Result<(), PlanError> {
        let graph = self.graph;

        for field in &def.fields {
            let path = if prefix.is_empty() {
                field.name.clone()
            } else {
                format!("{prefix}.{}", field.name)
            };

            let is_relation = match &field.kind {
                FieldKind::Scalar { .. } => continue,
                FieldKind::Embedded { .. } => false,
                FieldKind::Relation { .. } => {
                    let requested = options.iter().any(|option| {
                        option == &path
                            || option
                                .strip_prefix(path.as_str())
                                .is_some_and(|rest| rest.starts_with('.'))
                    });
                    if !(always_joined(field) || requested) {
                        continue;
                    }
                    true
                }
            };

            let Some(nested) = field.nested_type().and_then(|t| graph.get(t)) else {
                continue;
            };
            let unconditional = !is_relation || always_joined(field);
            if let Some(earlier) = chain.iter().rposition(|l| l.type_name == nested.name) {
                let unbounded =
                    unconditional && chain[earlier + 1..].iter().all(|l| l.unconditional);
                if unbounded {
                    return Err(PlanError::RelationCycle { path });
                }
            }

            if is_relation {
                self.joins.resolve(&path, true)?;
            }

            chain.push(ChainLink {
                type_name: nested.name.as_str(),
                unconditional,
            });
            self.walk_eager(nested, &path, chain, options)?;
            chain.pop();
        }
        Ok(())
    }

    /// Add predicates for one filter entry.
    ///
    /// The path is validated before anything is registered, so a rejected
    /// filter leaves the builder untouched.
    pub fn with_filter(
        &mut self,
        path: &str,
        value: &FilterValue,
    ) -> Result<&mut Self, PlanError> {
        self.validate_path(path)?;
        self.joins.resolve(path, false)?;
        let accessor = self.joins.accessor(path);

        match value {
            FilterValue::Null => self.predicates.push(Predicate {
                accessor,
                comparison: Comparison::IsNull,
                param: None,
            }),
            FilterValue::Scalar(scalar) => {
                let param = self.next_param(scalar.bind());
                self.predicates.push(Predicate {
                    accessor,
                    comparison: Comparison::Op(Operator::Eq),
                    param: Some(param),
                });
            }
            FilterValue::Operators(ops) => {
                let mut bound = Vec::new();
                for (op, operand) in ops.iter() {
                    let value = operand.bind(op).ok_or_else(|| PlanError::OperandInvalid {
                        field: path.to_string(),
                        operator: op.key(),
                    })?;
                    bound.push((op, value));
                }
                for (op, value) in bound {
                    let param = self.next_param(value);
                    self.predicates.push(Predicate {
                        accessor: accessor.clone(),
                        comparison: Comparison::Op(op),
                        param: Some(param),
                    });
                }
            }
        }
        Ok(self)
    }

    /// Append sort clauses in iteration order.
    pub fn with_order_by<'a>(
        &mut self,
        entries: impl IntoIterator<Item = (&'a str, SortDirection)>,
    ) -> Result<&mut Self, PlanError> {
        for (path, direction) in entries {
            self.validate_path(path)?;
            self.joins.resolve(path, false)?;
            self.sort.push(SortClause {
                accessor: self.joins.accessor(path),
                direction,
            });
        }
        Ok(self)
    }

    pub fn with_offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    /// Freeze the accumulated state into a plan.
    pub fn build(self) -> QueryPlan {
        let root = self.root;
        let id_column = root
            .get(&root.id_field)
            .map(|f| f.column_name().to_string())
            .unwrap_or_else(|| root.id_field.clone());

        let plan = QueryPlan {
            root_type: root.name.clone(),
            main_alias: self.joins.main_alias().to_string(),
            table: root.table.clone().unwrap_or_default(),
            id_column,
            joins: self.joins.into_joins(),
            predicates: self.predicates,
            sort: self.sort,
            offset: self.offset,
            limit: self.limit,
        };

        debug!(
            root = %plan.root_type,
            joins = plan.joins.len(),
            predicates = plan.predicates.len(),
            sort = plan.sort.len(),
            "query plan built"
        );
        plan
    }

    fn validate_path(&self, path: &str) -> Result<(), PlanError> {
        match self.graph.field_at_path(&self.root.name, path) {
            Some(_) => Ok(()),
            None => Err(PlanError::field_invalid(path, &self.root.name)),
        }
    }

    fn next_param(&mut self, value: ParamValue) -> NamedParam {
        let name = format!("value{}", self.next_param);
        self.next_param += 1;
        NamedParam { name, value }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::graph::{Cardinality, ExposureClass, FieldDeclaration, ScalarType};
    use crate::query::filter::{FilterScalar, OperatorMap};

    fn graph() -> RelationGraph {
        RelationGraph::builder()
            .register(
                TypeDefinition::entity("OrderBE", "orders")
                    .field(FieldDeclaration::scalar("id", ScalarType::Integer))
                    .field(FieldDeclaration::scalar("status", ScalarType::Text))
                    .field(FieldDeclaration::embedded("deliveryData", "DeliveryData"))
                    .field(
                        FieldDeclaration::relation(
                            "orderLines",
                            "OrderLineBE",
                            Cardinality::Many,
                            "id",
                            "order_id",
                        )
                        .exposure(ExposureClass::Association)
                        .allowed_as_option(),
                    )
                    .field(
                        FieldDeclaration::relation(
                            "customer",
                            "CustomerBE",
                            Cardinality::One,
                            "customer_id",
                            "id",
                        )
                        .exposure(ExposureClass::None)
                        .allowed_as_option(),
                    ),
            )
            .register(
                TypeDefinition::embeddable("DeliveryData")
                    .field(FieldDeclaration::scalar("deliveryDate", ScalarType::Date)),
            )
            .register(
                TypeDefinition::entity("OrderLineBE", "order_lines")
                    .field(FieldDeclaration::scalar("id", ScalarType::Integer))
                    .field(FieldDeclaration::relation(
                        "product",
                        "ProductBE",
                        Cardinality::One,
                        "product_id",
                        "id",
                    )),
            )
            .register(
                TypeDefinition::entity("ProductBE", "products")
                    .field(FieldDeclaration::scalar("id", ScalarType::Integer))
                    .field(FieldDeclaration::scalar("label", ScalarType::Text)),
            )
            .register(
                TypeDefinition::entity("CustomerBE", "customers")
                    .field(FieldDeclaration::scalar("id", ScalarType::Integer))
                    .field(
                        FieldDeclaration::relation(
                            "orders",
                            "OrderBE",
                            Cardinality::Many,
                            "id",
                            "customer_id",
                        )
                        .exposure(ExposureClass::None)
                        .allowed_as_option(),
                    ),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn embedded_range_filter_adds_two_predicates_without_join() {
        let graph = graph();
        let mut builder = QueryPlanBuilder::new(&graph, "OrderBE").unwrap();
        let d1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();

        builder
            .with_filter(
                "deliveryData.deliveryDate",
                &OperatorMap::new()
                    .with(Operator::Lte, d2)
                    .with(Operator::Gte, d1)
                    .into(),
            )
            .unwrap();
        let plan = builder.build();

        assert!(plan.joins.is_empty());
        assert_eq!(
            plan.clauses(),
            vec![
                "order.deliveryData.deliveryDate <= :value0",
                "order.deliveryData.deliveryDate >= :value1",
            ]
        );
        let params: Vec<&NamedParam> = plan.params().collect();
        assert_eq!(params[0].value, ParamValue::Text("2024-01-31".to_string()));
        assert_eq!(params[1].value, ParamValue::Text("2024-01-01".to_string()));
    }

    #[test]
    fn null_and_scalar_filters() {
        let graph = graph();
        let mut builder = QueryPlanBuilder::new(&graph, "OrderBE").unwrap();
        builder
            .with_filter("status", &FilterValue::Null)
            .unwrap()
            .with_filter("orderLines.product.label", &FilterValue::equals("chair"))
            .unwrap();
        let plan = builder.build();

        assert_eq!(
            plan.clauses(),
            vec![
                "order.status IS NULL",
                "orderLines_product.label = :value0"
            ]
        );
        assert!(plan.joins.iter().all(|j| !j.fetch_full));
    }

    #[test]
    fn parameter_names_are_unique_across_filters() {
        let graph = graph();
        let mut builder = QueryPlanBuilder::new(&graph, "OrderBE").unwrap();
        builder
            .with_filter("status", &FilterValue::equals("open"))
            .unwrap()
            .with_filter(
                "id",
                &OperatorMap::new()
                    .with_list(
                        Operator::In,
                        vec![FilterScalar::Integer(1), FilterScalar::Integer(2)],
                    )
                    .with(Operator::Ne, 3_i64)
                    .into(),
            )
            .unwrap();
        let plan = builder.build();

        let names: Vec<&str> = plan.params().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["value0", "value1", "value2"]);
        assert_eq!(plan.clauses()[2], "order.id IN (:value2)");
    }

    #[test]
    fn unknown_filter_field_is_rejected_before_registration() {
        let graph = graph();
        let mut builder = QueryPlanBuilder::new(&graph, "OrderBE").unwrap();
        let err = builder
            .with_filter("orderLines.ghost", &FilterValue::equals("x"))
            .unwrap_err();

        assert_eq!(
            err,
            PlanError::FieldInvalid {
                field: "orderLines.ghost".to_string(),
                entity: "OrderBE".to_string(),
            }
        );
        assert!(builder.build().joins.is_empty());
    }

    #[test]
    fn list_operand_on_scalar_operator_is_rejected() {
        let graph = graph();
        let mut builder = QueryPlanBuilder::new(&graph, "OrderBE").unwrap();
        let err = builder
            .with_filter(
                "id",
                &OperatorMap::new()
                    .with_list(Operator::Lt, vec![FilterScalar::Integer(1)])
                    .into(),
            )
            .unwrap_err();
        assert!(matches!(err, PlanError::OperandInvalid { operator: "lt", .. }));
    }

    #[test]
    fn eager_pass_includes_association_relations() {
        let graph = graph();
        let mut builder = QueryPlanBuilder::new(&graph, "OrderBE").unwrap();
        builder.with_eager_joins(&[]).unwrap();
        let plan = builder.build();

        let paths: Vec<&str> = plan.fetch_joins().map(|j| j.path.as_str()).collect();
        assert_eq!(paths, vec!["orderLines"]);
    }

    #[test]
    fn eager_pass_follows_options_on_boundaries() {
        let graph = graph();
        let mut builder = QueryPlanBuilder::new(&graph, "OrderBE").unwrap();
        builder
            .with_eager_joins(&["orderLines.product".to_string(), "cust".to_string()])
            .unwrap();
        let plan = builder.build();

        let paths: Vec<&str> = plan.fetch_joins().map(|j| j.path.as_str()).collect();
        assert_eq!(paths, vec!["orderLines", "orderLines.product"]);
    }

    #[test]
    fn option_bounded_back_reference_is_walked() {
        let graph = graph();
        let mut builder = QueryPlanBuilder::new(&graph, "OrderBE").unwrap();
        builder
            .with_eager_joins(&["customer.orders".to_string()])
            .unwrap();
        let plan = builder.build();

        for path in ["customer", "customer.orders", "customer.orders.orderLines"] {
            assert!(plan.join(path).is_some_and(|j| j.fetch_full), "{path}");
        }
        assert_eq!(
            plan.join("customer.orders").unwrap().alias,
            "customer_orders"
        );
        assert!(plan.join("customer.orders.customer").is_none());
    }

    #[test]
    fn eager_pass_detects_unbounded_cycles() {
        // Embedded structures are always walked, and the graph builder only
        // checks relations, so this self-containment reaches the walk.
        let graph = RelationGraph::builder()
            .register(
                TypeDefinition::entity("TreeBE", "trees")
                    .field(FieldDeclaration::scalar("id", ScalarType::Integer))
                    .field(FieldDeclaration::embedded("root", "Node")),
            )
            .register(
                TypeDefinition::embeddable("Node")
                    .field(FieldDeclaration::scalar("label", ScalarType::Text))
                    .field(FieldDeclaration::embedded("child", "Node")),
            )
            .build()
            .unwrap();

        let mut builder = QueryPlanBuilder::new(&graph, "TreeBE").unwrap();
        let err = builder.with_eager_joins(&[]).unwrap_err();
        assert_eq!(
            err,
            PlanError::RelationCycle {
                path: "root.child".to_string()
            }
        );
    }

    #[test]
    fn sort_and_window() {
        let graph = graph();
        let mut builder = QueryPlanBuilder::new(&graph, "OrderBE").unwrap();
        builder
            .with_order_by([
                ("customer.id", SortDirection::Desc),
                ("id", SortDirection::Asc),
            ])
            .unwrap()
            .with_offset(20)
            .with_limit(10);
        let plan = builder.build();

        assert_eq!(plan.sort[0].accessor.to_string(), "customer.id");
        assert_eq!(plan.sort[0].direction, SortDirection::Desc);
        assert_eq!(plan.sort[1].accessor.to_string(), "order.id");
        assert_eq!((plan.offset, plan.limit), (Some(20), Some(10)));
        assert_eq!(plan.table, "orders");
        assert_eq!(plan.id_column, "id");
    }

    #[test]
    fn embeddable_root_is_not_queryable() {
        let graph = graph();
        let err = QueryPlanBuilder::new(&graph, "DeliveryData").unwrap_err();
        assert_eq!(err, PlanError::NotQueryable("DeliveryData".to_string()));
    }
}
