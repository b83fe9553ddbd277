//! Inbound sanitization.
//!
//! Reduces a write payload to declared, writable state before it reaches the
//! store. Relation fields that are not exposed as full entities only accept
//! identifier references.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::convert;
use crate::graph::{FieldKind, FieldShape, RelationGraph, ScalarType};

use super::ProjectionError;

/// Sanitize a raw body against `type_name`.
pub fn sanitize(
    graph: &RelationGraph,
    type_name: &str,
    raw: &Value,
) -> Result<Value, ProjectionError> {
    let object = raw.as_object().ok_or(ProjectionError::BodyInvalid)?;
    sanitize_object(graph, type_name, object, "").map(Value::Object)
}

/// Sanitize a raw body and deserialize the result into `T`.
pub fn sanitize_into<T: DeserializeOwned>(
    graph: &RelationGraph,
    type_name: &str,
    raw: &Value,
) -> Result<T, ProjectionError> {
    let value = sanitize(graph, type_name, raw)?;
    Ok(serde_json::from_value(value)?)
}

fn sanitize_object(
    graph: &RelationGraph,
    type_name: &str,
    raw: &Map<String, Value>,
    path: &str,
) -> Result<Map<String, Value>, ProjectionError> {
    let def = graph
        .get(type_name)
        .ok_or_else(|| ProjectionError::UnknownType(type_name.to_string()))?;
    let mut out = Map::new();

    for (key, value) in raw {
        let Some(field) = def.get(key) else {
            continue;
        };
        if field.read_only {
            continue;
        }
        let field_path = if path.is_empty() {
            key.clone()
        } else {
            format!("{path}.{key}")
        };

        let sanitized = match (&field.kind, field.shape()) {
            (FieldKind::Relation { .. }, FieldShape::Entity { nested, .. }) => {
                let target = nested.unwrap_or_default();
                map_each(value, |item| entity(graph, target, item, &field_path))?
            }
            (FieldKind::Relation { target, .. }, _) => {
                let id_field = target
                    .as_deref()
                    .and_then(|t| graph.get(t))
                    .map_or("id", |t| t.id_field.as_str());
                map_each(value, |item| reference(item, id_field, &field_path))?
            }
            (FieldKind::Embedded { type_name }, _) => match value {
                Value::Object(nested) => {
                    Value::Object(sanitize_object(graph, type_name, nested, &field_path)?)
                }
                other => other.clone(),
            },
            (FieldKind::Scalar { scalar }, _) => coerce(*scalar, value, &field_path)?,
        };
        out.insert(key.clone(), sanitized);
    }

    Ok(out)
}

/// Apply `f` to a value or to each element of an array; `null` stays `null`.
fn map_each(
    value: &Value,
    f: impl Fn(&Value) -> Result<Value, ProjectionError>,
) -> Result<Value, ProjectionError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Array(items) => items
            .iter()
            .map(f)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => f(other),
    }
}

fn reference(value: &Value, id_field: &str, path: &str) -> Result<Value, ProjectionError> {
    let id = value
        .get(id_field)
        .filter(|id| !id.is_null())
        .ok_or_else(|| ProjectionError::ReferenceInvalid {
            field: path.to_string(),
        })?;
    let mut out = Map::new();
    out.insert(id_field.to_string(), id.clone());
    Ok(Value::Object(out))
}

fn entity(
    graph: &RelationGraph,
    type_name: &str,
    value: &Value,
    path: &str,
) -> Result<Value, ProjectionError> {
    let Value::Object(raw) = value else {
        return Err(ProjectionError::ReferenceInvalid {
            field: path.to_string(),
        });
    };
    let mut out = sanitize_object(graph, type_name, raw, path)?;

    // The nested id is usually read-only but still identifies the target.
    let id_field = graph
        .get(type_name)
        .map_or("id", |t| t.id_field.as_str());
    if let Some(id) = raw.get(id_field) {
        out.insert(id_field.to_string(), id.clone());
    }
    Ok(Value::Object(out))
}

fn coerce(scalar: ScalarType, value: &Value, path: &str) -> Result<Value, ProjectionError> {
    let Value::String(raw) = value else {
        return Ok(value.clone());
    };
    let conversion = |source| ProjectionError::Conversion {
        field: path.to_string(),
        source,
    };

    match scalar {
        ScalarType::Date => convert::to_date(raw)
            .map(|date| Value::String(date.format("%Y-%m-%d").to_string()))
            .map_err(conversion),
        ScalarType::Datetime => convert::to_datetime(raw)
            .map(|dt| {
                Value::String(dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
            })
            .map_err(conversion),
        _ => Ok(value.clone()),
    }
}
