#![allow(clippy::unwrap_used, clippy::expect_used)]
//! HTTP-level tests for the entity API.
//!
//! These drive the real router, service, planner and projection engine; only
//! the entity store is replaced by the in-memory one from `common`.

use axum::http::StatusCode;
use serde_json::{Value, json};

mod common;
use common::TestApp;

fn ids(items: &Value) -> Vec<i64> {
    items
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_i64().unwrap())
        .collect()
}

// ---------------------------------------------------------------------------
// Listing and pagination
// ---------------------------------------------------------------------------

#[tokio::test]
async fn partial_page_has_range_headers() {
    let app = TestApp::with_orders(16);
    let (status, headers, body) = app.get("/api/order?size=10").await;

    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(headers["accept-range"], "order 100");
    assert_eq!(headers["content-range"], "0-9/16");
    assert_eq!(headers["x-page-element-count"], "10");
    assert_eq!(headers["x-total-element"], "16");
    assert_eq!(headers["x-total-page"], "2");

    let link = headers["link"].to_str().unwrap();
    assert!(link.contains("<http://localhost:3000/api/order?size=10&page=1>; rel=\"next\""));
    assert!(link.contains("<http://localhost:3000/api/order?size=10&page=1>; rel=\"last\""));
    assert!(link.contains("<http://localhost:3000/api/order?size=10&page=0>; rel=\"first\""));
    assert!(!link.contains("rel=\"prev\""));

    assert_eq!(ids(&body), (1..=10).collect::<Vec<_>>());
}

#[tokio::test]
async fn complete_result_is_ok() {
    let app = TestApp::with_orders(16);
    let (status, headers, body) = app.get("/api/order?size=50").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-range"], "0-15/16");
    assert_eq!(headers["x-total-page"], "1");
    assert_eq!(body.as_array().unwrap().len(), 16);
}

#[tokio::test]
async fn second_page_links_back() {
    let app = TestApp::with_orders(16);
    let (status, headers, body) = app.get("/api/order?size=10&page=1").await;

    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(headers["content-range"], "10-15/16");
    let link = headers["link"].to_str().unwrap();
    assert!(link.contains("page=0>; rel=\"prev\""));
    assert!(!link.contains("rel=\"next\""));
    assert_eq!(ids(&body), (11..=16).collect::<Vec<_>>());
}

#[tokio::test]
async fn window_errors_are_reported() {
    let app = TestApp::with_orders(3);

    for (uri, code) in [
        ("/api/order?size=101", "size.max.exceeded"),
        ("/api/order?size=-1", "size.min.exceeded"),
        ("/api/order?page=-1", "page.min.exceeded"),
        ("/api/order?size=ten", "type.mismatch"),
    ] {
        let (status, _, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["code"], code, "{uri}");
    }
    assert!(app.store.plans().is_empty());
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn default_projection_collapses_and_hides() {
    let app = TestApp::with_orders(1);
    let (_, _, body) = app.get("/api/order").await;

    assert_eq!(
        body[0],
        json!({
            "id": 1,
            "status": "open",
            "total": 10.0,
            "deliveryData": {"street": "Main St 1", "deliveryDate": "2024-03-01"},
            "customer": {"id": 7},
            "orderLines": [{"id": 10}],
        })
    );
}

#[tokio::test]
async fn options_expand_relations() {
    let app = TestApp::with_orders(1);

    let (_, _, body) = app.get("/api/order?options=orderLines").await;
    assert_eq!(
        body[0]["orderLines"],
        json!([{"id": 10, "quantity": 1, "product": {"id": 100}}])
    );

    let (_, _, body) = app.get("/api/order?options=orderLines.product,notes").await;
    assert_eq!(
        body[0]["orderLines"][0]["product"],
        json!({"id": 100, "label": "chair"})
    );
    assert_eq!(body[0]["notes"], json!([{"id": 100, "text": "leave at the door"}]));
}

#[tokio::test]
async fn unknown_option_is_rejected_before_the_store() {
    let app = TestApp::with_orders(1);
    let (status, _, body) = app.get("/api/order?options=unknown").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "option.not.allowed");
    assert_eq!(body["field"], "unknown");
    assert!(app.store.plans().is_empty());
}

#[tokio::test]
async fn eager_pass_joins_associations_and_requested_options() {
    let app = TestApp::with_orders(1);

    app.get("/api/order").await;
    app.get("/api/order?options=notes").await;

    let plans = app.store.plans();
    let paths = |i: usize| -> Vec<String> {
        plans[i]
            .joins
            .iter()
            .filter(|j| j.fetch_full)
            .map(|j| j.path.clone())
            .collect()
    };

    let first = paths(0);
    assert!(first.contains(&"customer".to_string()));
    assert!(first.contains(&"orderLines".to_string()));
    assert!(first.contains(&"orderLines.product".to_string()));
    assert!(!first.contains(&"notes".to_string()));

    assert!(paths(1).contains(&"notes".to_string()));
}

// ---------------------------------------------------------------------------
// Filters and sort
// ---------------------------------------------------------------------------

#[tokio::test]
async fn equality_filter_narrows_the_total() {
    let app = TestApp::with_orders(16);
    let (status, headers, body) = app.get("/api/order?status=open&size=50").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-total-element"], "8");
    assert!(
        body.as_array()
            .unwrap()
            .iter()
            .all(|order| order["status"] == "open")
    );
}

#[tokio::test]
async fn operator_filters_and_sort() {
    let app = TestApp::with_orders(16);
    let (_, _, body) = app
        .get("/api/order?id%5Bgte%5D=5&id%5Blt%5D=9&sort=id,desc")
        .await;
    assert_eq!(ids(&body), vec![8, 7, 6, 5]);

    let (_, _, body) = app.get("/api/order?id%5Bin%5D=2,4,99").await;
    assert_eq!(ids(&body), vec![2, 4]);

    let plan = app.store.plans().remove(0);
    assert_eq!(
        plan.clauses(),
        vec!["order.id < :value0", "order.id >= :value1"]
    );
}

#[tokio::test]
async fn request_errors_are_reported() {
    let app = TestApp::with_orders(3);

    for (uri, code) in [
        ("/api/order?bogus=1", "field.invalid"),
        ("/api/order?status%5Bbetween%5D=x", "filter.operator.invalid"),
        ("/api/order?total%5Bgt%5D=lots", "type.mismatch"),
        ("/api/order?sort=id,up", "sort.malformed"),
        ("/api/order?sort=bogus", "field.invalid"),
    ] {
        let (status, _, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["code"], code, "{uri}");
    }
}

// ---------------------------------------------------------------------------
// Single entity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_one_entity() {
    let app = TestApp::with_orders(5);

    let (status, _, body) = app.get("/api/order/3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 3);
    assert_eq!(body["customer"], json!({"id": 7}));
    assert!(body.get("internalCode").is_none());

    let (_, _, body) = app.get("/api/order/3?options=customer").await;
    assert_eq!(body["customer"], json!({"id": 7, "name": "Ada"}));
}

#[tokio::test]
async fn missing_entities_and_resources() {
    let app = TestApp::with_orders(5);

    assert_eq!(app.get("/api/order/99").await.0, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/api/ghost").await.0, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/api/deliveryData").await.0, StatusCode::NOT_FOUND);

    let (status, _, body) = app.get("/api/order/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "type.mismatch");
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_sanitizes_the_body() {
    let app = TestApp::with_orders(16);
    let (status, body) = app
        .post_json(
            "/api/order",
            &json!({"id": 5, "status": "new", "customer": {"id": 7, "name": "x"}, "bogus": 1}),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"id": 17, "status": "new", "customer": {"id": 7}}));

    let saved = app.store.saved();
    assert_eq!(
        Value::Object(saved[0].clone()),
        json!({"status": "new", "customer": {"id": 7}})
    );
}

#[tokio::test]
async fn create_rejects_bad_bodies() {
    let app = TestApp::with_orders(1);

    let (status, body) = app
        .post_json("/api/order", &json!({"customer": {"name": "x"}}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "reference.invalid");

    let (status, body) = app.post_json("/api/order", &json!([1, 2])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "body.invalid");

    let (status, body) = app
        .post_json("/api/order", &json!({"placedAt": "yesterday"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "type.mismatch");

    assert!(app.store.saved().is_empty());
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_store_and_graph() {
    let app = TestApp::with_orders(0);
    let (status, _, body) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy", "store": true, "types": 6}));
}
