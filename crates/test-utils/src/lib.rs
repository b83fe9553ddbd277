//! Trellis test utilities.
//!
//! Helpers for integration testing: the order relation graph fixture and
//! builders for hydrated order documents as a store would return them.

use serde_json::{Value as JsonValue, json};

/// Relation graph used across integration tests.
///
/// `OrderBE` exposes `customer` and `orderLines` as associations, hides
/// `notes` unless requested and never exposes `internalCode`.
pub const ORDER_GRAPH_YAML: &str = r#"
types:
  - name: OrderBE
    table: orders
    fields:
      - { name: id, kind: scalar, type: integer, read_only: true }
      - { name: status, kind: scalar, type: text }
      - { name: total, kind: scalar, type: float }
      - { name: placedAt, kind: scalar, type: datetime, column: placed_at }
      - { name: internalCode, kind: scalar, type: text, never_exposed: true, column: internal_code }
      - { name: deliveryData, kind: embedded, type: DeliveryData, column: delivery_data }
      - name: customer
        kind: relation
        target: CustomerBE
        join: { local: customer_id, foreign: id }
        exposure: association
        allowed_as_option: true
      - name: orderLines
        kind: relation
        target: OrderLineBE
        cardinality: many
        join: { local: id, foreign: order_id }
        exposure: association
        allowed_as_option: true
      - name: notes
        kind: relation
        target: NoteBE
        cardinality: many
        join: { local: id, foreign: order_id }
        exposure: none
        allowed_as_option: true

  - name: DeliveryData
    fields:
      - { name: street, kind: scalar, type: text }
      - { name: deliveryDate, kind: scalar, type: date }

  - name: OrderLineBE
    table: order_lines
    fields:
      - { name: id, kind: scalar, type: integer, read_only: true }
      - { name: quantity, kind: scalar, type: integer }
      - name: product
        kind: relation
        target: ProductBE
        join: { local: product_id, foreign: id }
        exposure: association
        allowed_as_option: true

  - name: ProductBE
    table: products
    fields:
      - { name: id, kind: scalar, type: integer, read_only: true }
      - { name: label, kind: scalar, type: text }

  - name: CustomerBE
    table: customers
    fields:
      - { name: id, kind: scalar, type: integer, read_only: true }
      - { name: name, kind: scalar, type: text }

  - name: NoteBE
    table: notes
    fields:
      - { name: id, kind: scalar, type: integer, read_only: true }
      - { name: text, kind: scalar, type: text }
"#;

/// Create a test order with default values.
pub fn test_order(id: i64) -> TestOrder {
    TestOrder {
        id,
        status: "open".to_string(),
        total: 10.0,
        delivery_date: "2024-03-01".to_string(),
        customer: Some((7, "Ada".to_string())),
        lines: Vec::new(),
        notes: Vec::new(),
    }
}

/// An order document builder for creating test fixtures.
#[derive(Debug, Clone)]
pub struct TestOrder {
    pub id: i64,
    pub status: String,
    pub total: f64,
    pub delivery_date: String,
    pub customer: Option<(i64, String)>,
    /// `(line id, quantity, product id, product label)`
    pub lines: Vec<(i64, i64, i64, String)>,
    /// `(note id, text)`
    pub notes: Vec<(i64, String)>,
}

impl TestOrder {
    /// Set the status.
    pub fn with_status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    /// Set the total.
    pub fn with_total(mut self, total: f64) -> Self {
        self.total = total;
        self
    }

    /// Set the delivery date (`YYYY-MM-DD`).
    pub fn delivered_on(mut self, date: &str) -> Self {
        self.delivery_date = date.to_string();
        self
    }

    /// Remove the customer.
    pub fn without_customer(mut self) -> Self {
        self.customer = None;
        self
    }

    /// Add an order line.
    pub fn with_line(mut self, id: i64, quantity: i64, product_id: i64, label: &str) -> Self {
        self.lines.push((id, quantity, product_id, label.to_string()));
        self
    }

    /// Add a note.
    pub fn with_note(mut self, id: i64, text: &str) -> Self {
        self.notes.push((id, text.to_string()));
        self
    }

    /// Build the fully hydrated document.
    pub fn build(self) -> JsonValue {
        let customer = match self.customer {
            Some((id, name)) => json!({"id": id, "name": name}),
            None => JsonValue::Null,
        };
        let lines: Vec<JsonValue> = self
            .lines
            .into_iter()
            .map(|(id, quantity, product_id, label)| {
                json!({
                    "id": id,
                    "quantity": quantity,
                    "product": {"id": product_id, "label": label},
                })
            })
            .collect();
        let notes: Vec<JsonValue> = self
            .notes
            .into_iter()
            .map(|(id, text)| json!({"id": id, "text": text}))
            .collect();

        json!({
            "id": self.id,
            "status": self.status,
            "total": self.total,
            "internalCode": format!("INT-{}", self.id),
            "deliveryData": {"street": "Main St 1", "deliveryDate": self.delivery_date},
            "customer": customer,
            "orderLines": lines,
            "notes": notes,
        })
    }
}

/// `count` orders with ids `1..=count`, alternating open/closed, one line each.
pub fn order_fixtures(count: i64) -> Vec<JsonValue> {
    (1..=count)
        .map(|id| {
            let status = if id % 2 == 1 { "open" } else { "closed" };
            test_order(id)
                .with_status(status)
                .with_line(id * 10, 1, 100, "chair")
                .with_note(id * 100, "leave at the door")
                .build()
        })
        .collect()
}
