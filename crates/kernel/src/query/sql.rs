//! PostgreSQL rendering of query plans using SeaQuery.
//!
//! Generates the statements the store executes for a [`QueryPlan`]:
//! - the main SELECT (one `to_jsonb` column per selected alias); the page
//!   window is applied to root identifiers, not to joined rows
//! - the COUNT query for the total element count
//! - the INSERT for a sanitized write payload
//!
//! Values are inlined by SeaQuery's escaping; every identifier that ends up in
//! a custom expression is checked with [`is_safe_identifier`].

use sea_query::{
    Alias, Expr, ExprTrait, JoinType, Order, PostgresQueryBuilder, Query, SelectStatement,
    SimpleExpr, Value, WindowStatement,
};
use serde_json::Map;

use crate::graph::{
    Cardinality, FieldDeclaration, FieldKind, RelationGraph, ScalarType, TypeDefinition,
};

use super::error::RenderError;
use super::types::{Accessor, Comparison, Operator, ParamValue, QueryPlan, SortDirection};

const ROOT_ID: &str = "root_id";
const ROOT_RANK: &str = "root_rank";

/// Check that a name is safe to interpolate as a SQL identifier or JSONB key.
pub(crate) fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
}

fn ident(name: &str) -> Result<&str, RenderError> {
    if is_safe_identifier(name) {
        Ok(name)
    } else {
        Err(RenderError::UnsafeIdentifier(name.to_string()))
    }
}

/// Renders one plan against the graph it was built from.
pub struct SqlRenderer<'a> {
    graph: &'a RelationGraph,
    plan: &'a QueryPlan,
}

impl<'a> SqlRenderer<'a> {
    pub fn new(graph: &'a RelationGraph, plan: &'a QueryPlan) -> Self {
        Self { graph, plan }
    }

    /// Build the main SELECT.
    ///
    /// The root row and every fetch join are selected as one JSONB column
    /// named after their alias; filter-only joins are not selected. With an
    /// offset or limit, the roots are restricted to the page's identifiers so
    /// to-many fetch joins cannot shrink the page.
    pub fn build(&self) -> Result<String, RenderError> {
        let mut query = Query::select();

        let main = ident(&self.plan.main_alias)?;
        query.expr_as(Expr::cust(format!("to_jsonb(\"{main}\")")), Alias::new(main));
        for join in self.plan.fetch_joins() {
            let alias = ident(&join.alias)?;
            query.expr_as(
                Expr::cust(format!("to_jsonb(\"{alias}\")")),
                Alias::new(alias),
            );
        }

        self.add_from(&mut query)?;
        self.add_joins(&mut query)?;
        if self.plan.limit.is_some() || self.plan.offset.is_some() {
            let id = ident(&self.plan.id_column)?;
            query.and_where(
                Expr::col((Alias::new(main), Alias::new(id))).in_subquery(self.page_ids()?),
            );
        }
        self.add_predicates(&mut query)?;
        self.add_sorts(&mut query)?;

        Ok(query.to_string(PostgresQueryBuilder))
    }

    /// Root identifiers of the requested page.
    ///
    /// Every joined row is ranked by the full sort and a root takes the rank
    /// of its first row, so offset and limit count roots.
    fn page_ids(&self) -> Result<SelectStatement, RenderError> {
        let main = ident(&self.plan.main_alias)?;
        let id = ident(&self.plan.id_column)?;

        let mut window = WindowStatement::new();
        for (expr, order) in self.sort_exprs()? {
            window.order_by_expr(expr, order);
        }

        let mut ranked = Query::select();
        ranked
            .expr_as(Expr::col((Alias::new(main), Alias::new(id))), Alias::new(ROOT_ID))
            .expr_window_as(Expr::cust("ROW_NUMBER()"), window, Alias::new(ROOT_RANK));
        self.add_from(&mut ranked)?;
        self.add_joins(&mut ranked)?;
        self.add_predicates(&mut ranked)?;

        let mut page = Query::select();
        page.column(Alias::new(ROOT_ID))
            .from_subquery(ranked, Alias::new("ranked"))
            .group_by_col(Alias::new(ROOT_ID))
            .order_by_expr(Expr::cust(format!("MIN(\"{ROOT_RANK}\")")), Order::Asc);
        if let Some(limit) = self.plan.limit {
            page.limit(limit);
        }
        if let Some(offset) = self.plan.offset {
            page.offset(offset);
        }
        Ok(page)
    }

    /// Build a COUNT query over distinct root ids.
    pub fn build_count(&self) -> Result<String, RenderError> {
        let mut query = Query::select();

        let main = ident(&self.plan.main_alias)?;
        let id = ident(&self.plan.id_column)?;
        query.expr(Expr::cust(format!("COUNT(DISTINCT \"{main}\".\"{id}\")")));

        self.add_from(&mut query)?;
        self.add_joins(&mut query)?;
        self.add_predicates(&mut query)?;

        Ok(query.to_string(PostgresQueryBuilder))
    }

    fn add_from(&self, query: &mut SelectStatement) -> Result<(), RenderError> {
        query.from_as(
            Alias::new(ident(&self.plan.table)?),
            Alias::new(ident(&self.plan.main_alias)?),
        );
        Ok(())
    }

    /// LEFT JOIN every registered join in registration order.
    fn add_joins(&self, query: &mut SelectStatement) -> Result<(), RenderError> {
        for join in &self.plan.joins {
            let target = self.require(&join.target_type)?;
            let table = target
                .table
                .as_deref()
                .ok_or_else(|| RenderError::UnknownType(join.target_type.clone()))?;
            let alias = ident(&join.alias)?;
            let parent = ident(&join.parent_alias)?;
            let local = ident(&join.join.local)?;
            let foreign = ident(&join.join.foreign)?;

            let on_condition = match join.relative.split_last() {
                Some((_, [])) | None => Expr::col((Alias::new(parent), Alias::new(local)))
                    .equals((Alias::new(alias), Alias::new(foreign))),
                Some((_, embedded)) => {
                    // Relation declared inside an embedded structure: the key
                    // lives in the parent's JSONB column.
                    let owner = self.require(&join.parent_type)?;
                    let (path, _) = self.json_path(parent, owner, embedded)?;
                    Expr::cust(format!(
                        "({path}->>'{local}') = \"{alias}\".\"{foreign}\"::text"
                    ))
                }
            };

            query.join_as(
                JoinType::LeftJoin,
                Alias::new(ident(table)?),
                Alias::new(alias),
                on_condition,
            );
        }
        Ok(())
    }

    fn add_predicates(&self, query: &mut SelectStatement) -> Result<(), RenderError> {
        for predicate in &self.plan.predicates {
            let lhs = self.accessor_expr(&predicate.accessor)?;
            let condition = match (predicate.comparison, &predicate.param) {
                (Comparison::IsNull, _) => lhs.is_null(),
                (Comparison::Op(op), Some(param)) => compare(lhs, op, &param.value),
                (Comparison::Op(_), None) => continue,
            };
            query.and_where(condition);
        }
        Ok(())
    }

    fn add_sorts(&self, query: &mut SelectStatement) -> Result<(), RenderError> {
        for (expr, order) in self.sort_exprs()? {
            query.order_by_expr(expr, order);
        }
        Ok(())
    }

    /// Sorts in insertion order, then the root id as a stable tie-breaker.
    fn sort_exprs(&self) -> Result<Vec<(SimpleExpr, Order)>, RenderError> {
        let mut sorts = Vec::with_capacity(self.plan.sort.len() + 1);
        for sort in &self.plan.sort {
            let order = match sort.direction {
                SortDirection::Asc => Order::Asc,
                SortDirection::Desc => Order::Desc,
            };
            sorts.push((self.accessor_expr(&sort.accessor)?, order));
        }
        let root_id = Expr::col((
            Alias::new(ident(&self.plan.main_alias)?),
            Alias::new(ident(&self.plan.id_column)?),
        ));
        sorts.push((root_id.into(), Order::Asc));
        Ok(sorts)
    }

    /// Expression for an accessor.
    ///
    /// A single segment is a column on the alias. Longer accessors descend
    /// into an embedded JSONB column and cast the extracted text to the
    /// declared scalar type.
    fn accessor_expr(&self, accessor: &Accessor) -> Result<SimpleExpr, RenderError> {
        let alias = ident(&accessor.alias)?;
        let owner = self.require(&accessor.owner)?;

        let Some((last, embedded)) = accessor.segments.split_last() else {
            return Err(RenderError::UnknownField {
                type_name: owner.name.clone(),
                field: String::new(),
            });
        };

        if embedded.is_empty() {
            let field = field_of(owner, last)?;
            return match &field.kind {
                FieldKind::Relation {
                    cardinality: Cardinality::Many,
                    target,
                    ..
                } => {
                    // To-many relation compared as a whole: test the joined
                    // row's identifier.
                    let joined = if accessor.alias == self.plan.main_alias {
                        last.clone()
                    } else {
                        format!("{alias}_{last}")
                    };
                    let target_name = target.as_deref().unwrap_or_default();
                    let target = self.require(target_name)?;
                    Ok(Expr::col((
                        Alias::new(ident(&joined)?),
                        Alias::new(ident(id_column(target))?),
                    ))
                    .into())
                }
                FieldKind::Relation { join, .. } => {
                    Ok(Expr::col((Alias::new(alias), Alias::new(ident(&join.local)?))).into())
                }
                _ => Ok(Expr::col((
                    Alias::new(alias),
                    Alias::new(ident(field.column_name())?),
                ))
                .into()),
            };
        }

        let (path, terminal_owner) = self.json_path(alias, owner, embedded)?;
        let field = field_of(terminal_owner, last)?;
        let key = ident(field.column_name())?;

        let expr = match &field.kind {
            FieldKind::Scalar {
                scalar: ScalarType::Json,
            }
            | FieldKind::Embedded { .. } => format!("({path}->'{key}')"),
            FieldKind::Scalar { scalar } => match cast(*scalar) {
                Some(ty) => format!("(({path}->>'{key}')::{ty})"),
                None => format!("({path}->>'{key}')"),
            },
            FieldKind::Relation { join, .. } => {
                format!("({path}->>'{}')", ident(&join.local)?)
            }
        };
        Ok(Expr::cust(expr))
    }

    /// JSONB navigation through embedded segments starting at `alias`.
    ///
    /// Returns the path expression and the type reached after the last segment.
    fn json_path(
        &self,
        alias: &str,
        owner: &'a TypeDefinition,
        segments: &[String],
    ) -> Result<(String, &'a TypeDefinition), RenderError> {
        let mut owner = owner;
        let mut path = String::new();

        for (i, segment) in segments.iter().enumerate() {
            let field = field_of(owner, segment)?;
            let column = ident(field.column_name())?;
            path = if i == 0 {
                format!("\"{alias}\".\"{column}\"")
            } else {
                format!("{path}->'{column}'")
            };
            let nested = field
                .nested_type()
                .ok_or_else(|| RenderError::UnknownField {
                    type_name: owner.name.clone(),
                    field: segment.clone(),
                })?;
            owner = self.require(nested)?;
        }
        Ok((path, owner))
    }

    fn require(&self, type_name: &str) -> Result<&'a TypeDefinition, RenderError> {
        self.graph
            .get(type_name)
            .ok_or_else(|| RenderError::UnknownType(type_name.to_string()))
    }
}

/// Build an INSERT for a sanitized payload, returning the new identifier.
///
/// Scalars map to their columns, embedded structures are written as JSONB
/// text, to-one associations write their identifier into the local join
/// column. To-many associations are owned by the child rows and skipped.
pub fn render_insert(
    def: &TypeDefinition,
    row: &Map<String, serde_json::Value>,
) -> Result<String, RenderError> {
    let table = def
        .table
        .as_deref()
        .ok_or_else(|| RenderError::UnknownType(def.name.clone()))?;
    let table = ident(table)?;
    let id = ident(id_column(def))?;

    let mut columns = Vec::new();
    let mut values: Vec<SimpleExpr> = Vec::new();

    for (key, value) in row {
        let Some(field) = def.get(key) else {
            continue;
        };
        let (column, value) = match &field.kind {
            FieldKind::Scalar { .. } | FieldKind::Embedded { .. } => {
                if value.is_null() && field.name == def.id_field {
                    continue;
                }
                (field.column_name(), sql_value(value))
            }
            FieldKind::Relation {
                cardinality: Cardinality::One,
                join,
                ..
            } if join.local != id => {
                let reference = value.get("id").unwrap_or(&serde_json::Value::Null);
                (join.local.as_str(), sql_value(reference))
            }
            FieldKind::Relation { .. } => continue,
        };
        columns.push(Alias::new(ident(column)?));
        values.push(value.into());
    }

    if columns.is_empty() {
        return Ok(format!(
            "INSERT INTO \"{table}\" DEFAULT VALUES RETURNING to_jsonb(\"{id}\")"
        ));
    }

    let mut insert = Query::insert();
    insert
        .into_table(Alias::new(table))
        .columns(columns)
        .values(values)?;

    Ok(format!(
        "{} RETURNING to_jsonb(\"{id}\")",
        insert.to_string(PostgresQueryBuilder)
    ))
}

fn field_of<'d>(
    owner: &'d TypeDefinition,
    name: &str,
) -> Result<&'d FieldDeclaration, RenderError> {
    owner.get(name).ok_or_else(|| RenderError::UnknownField {
        type_name: owner.name.clone(),
        field: name.to_string(),
    })
}

fn id_column(def: &TypeDefinition) -> &str {
    def.get(&def.id_field)
        .map(FieldDeclaration::column_name)
        .unwrap_or(&def.id_field)
}

/// PostgreSQL cast applied to text extracted from JSONB.
fn cast(scalar: ScalarType) -> Option<&'static str> {
    match scalar {
        ScalarType::Integer => Some("bigint"),
        ScalarType::Float => Some("double precision"),
        ScalarType::Boolean => Some("boolean"),
        ScalarType::Date => Some("date"),
        ScalarType::Datetime => Some("timestamptz"),
        ScalarType::Uuid => Some("uuid"),
        ScalarType::Text | ScalarType::Json => None,
    }
}

fn compare(lhs: SimpleExpr, op: Operator, value: &ParamValue) -> SimpleExpr {
    match op {
        Operator::Lt => lhs.lt(param_value(value)),
        Operator::Lte => lhs.lte(param_value(value)),
        Operator::Gt => lhs.gt(param_value(value)),
        Operator::Gte => lhs.gte(param_value(value)),
        Operator::Eq => lhs.eq(param_value(value)),
        Operator::Ne => lhs.ne(param_value(value)),
        Operator::In | Operator::Nin => {
            let values = list_values(value);
            match (op, values.is_empty()) {
                // Nothing is in the empty set.
                (Operator::In, true) => Expr::cust("FALSE"),
                (_, true) => Expr::cust("TRUE"),
                (Operator::In, false) => lhs.is_in(values),
                (_, false) => lhs.is_not_in(values),
            }
        }
        Operator::Like => {
            let pattern = match value {
                ParamValue::Text(s) => s.clone(),
                other => param_text(other),
            };
            lhs.like(pattern)
        }
    }
}

fn param_value(value: &ParamValue) -> Value {
    match value {
        ParamValue::Text(s) => s.as_str().into(),
        ParamValue::Integer(i) => (*i).into(),
        ParamValue::Float(f) => (*f).into(),
        ParamValue::Boolean(b) => (*b).into(),
        // List operands only reach `in` / `nin`.
        ParamValue::List(_) => param_text(value).into(),
    }
}

fn param_text(value: &ParamValue) -> String {
    match value {
        ParamValue::Text(s) => s.clone(),
        ParamValue::Integer(i) => i.to_string(),
        ParamValue::Float(f) => f.to_string(),
        ParamValue::Boolean(b) => b.to_string(),
        ParamValue::List(items) => items.iter().map(param_text).collect::<Vec<_>>().join(","),
    }
}

fn list_values(value: &ParamValue) -> Vec<Value> {
    match value {
        ParamValue::List(items) => items.iter().map(param_value).collect(),
        other => vec![param_value(other)],
    }
}

fn sql_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::String(None),
        serde_json::Value::Bool(b) => (*b).into(),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => i.into(),
            None => n.as_f64().unwrap_or_default().into(),
        },
        serde_json::Value::String(s) => s.as_str().into(),
        other => other.to_string().into(),
    }
}
