#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Shared test infrastructure.
//!
//! Drives the real router against an in-memory entity store. The store keeps
//! fully hydrated documents per type and evaluates the parts of a plan that
//! touch root fields: equality-style predicates, sort and the page window.

#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::{Map, Value};
use tower::ServiceExt;

use trellis_kernel::graph::{RelationGraph, TypeDefinition};
use trellis_kernel::query::{
    Comparison, EntityStore, Operator, ParamValue, PlanRows, Predicate, QueryPlan, SortDirection,
};
use trellis_kernel::routes;
use trellis_kernel::service::ListingSettings;
use trellis_kernel::state::AppState;
use trellis_test_utils::{ORDER_GRAPH_YAML, order_fixtures};

/// In-memory [`EntityStore`].
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, Vec<Value>>>,
    plans: Mutex<Vec<QueryPlan>>,
    saved: Mutex<Vec<Map<String, Value>>>,
}

impl MemoryStore {
    pub fn with_docs(type_name: &str, docs: Vec<Value>) -> Self {
        let store = Self::default();
        store
            .docs
            .lock()
            .unwrap()
            .insert(type_name.to_string(), docs);
        store
    }

    /// Plans executed so far.
    pub fn plans(&self) -> Vec<QueryPlan> {
        self.plans.lock().unwrap().clone()
    }

    /// Payloads handed to `save`.
    pub fn saved(&self) -> Vec<Map<String, Value>> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn execute(&self, _graph: &RelationGraph, plan: &QueryPlan) -> anyhow::Result<PlanRows> {
        self.plans.lock().unwrap().push(plan.clone());
        let docs = self.docs.lock().unwrap();

        let mut matching: Vec<Value> = docs
            .get(&plan.root_type)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|doc| {
                plan.predicates
                    .iter()
                    .all(|p| p.accessor.alias != plan.main_alias || evaluate(doc, p))
            })
            .collect();

        for clause in plan.sort.iter().rev() {
            let segments = &clause.accessor.segments;
            matching.sort_by(|a, b| {
                let ordering = compare(lookup(a, segments), lookup(b, segments));
                match clause.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }

        let total = matching.len() as u64;
        let offset = usize::try_from(plan.offset.unwrap_or(0)).unwrap();
        let limit = plan.limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap());
        let rows = matching.into_iter().skip(offset).take(limit).collect();

        Ok(PlanRows {
            rows,
            total: Some(total),
        })
    }

    async fn save(&self, def: &TypeDefinition, row: Map<String, Value>) -> anyhow::Result<Value> {
        self.saved.lock().unwrap().push(row.clone());

        let mut docs = self.docs.lock().unwrap();
        let entries = docs.entry(def.name.clone()).or_default();
        let id = entries
            .iter()
            .filter_map(|d| d.get(&def.id_field).and_then(Value::as_i64))
            .max()
            .unwrap_or(0)
            + 1;

        let mut doc = row;
        doc.insert(def.id_field.clone(), Value::from(id));
        entries.push(Value::Object(doc));
        Ok(Value::from(id))
    }

    async fn health(&self) -> bool {
        true
    }
}

static NULL: Value = Value::Null;

fn lookup<'v>(doc: &'v Value, segments: &[String]) -> &'v Value {
    let value = segments
        .iter()
        .try_fold(doc, |v, s| v.get(s))
        .unwrap_or(&NULL);
    // Relations compare on their identifier.
    match value {
        Value::Object(o) => o.get("id").unwrap_or(&NULL),
        other => other,
    }
}

fn param_json(param: &ParamValue) -> Value {
    serde_json::to_value(param).unwrap()
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap()
            .partial_cmp(&y.as_f64().unwrap())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn evaluate(doc: &Value, predicate: &Predicate) -> bool {
    let value = lookup(doc, &predicate.accessor.segments);
    let Comparison::Op(op) = predicate.comparison else {
        return value.is_null();
    };
    let Some(param) = predicate.param.as_ref().map(|p| param_json(&p.value)) else {
        return false;
    };

    match op {
        Operator::Eq => compare(value, &param) == Ordering::Equal,
        Operator::Ne => compare(value, &param) != Ordering::Equal,
        Operator::Lt => compare(value, &param) == Ordering::Less,
        Operator::Lte => compare(value, &param) != Ordering::Greater,
        Operator::Gt => compare(value, &param) == Ordering::Greater,
        Operator::Gte => compare(value, &param) != Ordering::Less,
        Operator::In | Operator::Nin => {
            let found = param
                .as_array()
                .is_some_and(|items| items.iter().any(|i| compare(value, i) == Ordering::Equal));
            found == (op == Operator::In)
        }
        Operator::Like => {
            let pattern = param.as_str().unwrap_or_default().replace('%', "");
            value.as_str().is_some_and(|s| s.contains(&pattern))
        }
    }
}

/// Test application wrapper.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    /// App over the order graph with `count` order fixtures.
    pub fn with_orders(count: i64) -> Self {
        Self::new(MemoryStore::with_docs("OrderBE", order_fixtures(count)))
    }

    pub fn new(store: MemoryStore) -> Self {
        let graph = Arc::new(RelationGraph::from_yaml_str(ORDER_GRAPH_YAML).unwrap());
        let store = Arc::new(store);
        let state = AppState::from_parts(graph, store.clone(), ListingSettings::default());
        Self {
            router: routes::app(state),
            store,
        }
    }

    /// Make a request to the app.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// GET `uri`, returning status, response and parsed JSON body.
    pub async fn get(&self, uri: &str) -> (StatusCode, axum::http::HeaderMap, Value) {
        let response = self
            .request(Request::get(uri).body(Body::empty()).unwrap())
            .await;
        split(response).await
    }

    /// POST a JSON body to `uri`.
    pub async fn post_json(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        let response = self
            .request(
                Request::post(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await;
        let (status, _, body) = split(response).await;
        (status, body)
    }
}

async fn split(response: Response) -> (StatusCode, axum::http::HeaderMap, Value) {
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}
