//! Outbound projection.
//!
//! Prunes a response graph in place: never-exposed fields are removed, hidden
//! fields are removed unless an option asks for them, associations collapse to
//! `{id}` references unless an option asks for them, everything else is walked
//! recursively with the nested type.

use serde_json::{Map, Value};
use tracing::error;

use crate::graph::{FieldShape, RelationGraph, TypeDefinition};

use super::ProjectionError;
use super::options::{OptionMatching, OptionSet};

/// Reject options that are not declared as allowed options on `type_name`.
///
/// Every intermediate segment must be a relation or embedded field and the
/// terminal field must carry `allowed_as_option`.
pub fn validate_options(
    graph: &RelationGraph,
    type_name: &str,
    options: &OptionSet,
) -> Result<(), ProjectionError> {
    for option in options.iter() {
        let allowed = graph
            .field_at_path(type_name, option)
            .is_some_and(|(_, field)| field.allowed_as_option);
        if !allowed {
            return Err(ProjectionError::OptionNotAllowed {
                option: option.to_string(),
                type_name: type_name.to_string(),
            });
        }
    }
    Ok(())
}

/// Validate `options`, then prune `value` (an entity or a list of entities).
pub fn project(
    graph: &RelationGraph,
    type_name: &str,
    mut value: Value,
    options: &OptionSet,
    matching: OptionMatching,
) -> Result<Value, ProjectionError> {
    validate_options(graph, type_name, options)?;
    let def = graph
        .get(type_name)
        .ok_or_else(|| ProjectionError::UnknownType(type_name.to_string()))?;

    let pruner = Pruner {
        graph,
        options,
        matching,
    };
    pruner.prune(def, &mut value, "")?;
    Ok(value)
}

struct Pruner<'a> {
    graph: &'a RelationGraph,
    options: &'a OptionSet,
    matching: OptionMatching,
}

impl Pruner<'_> {
    fn prune(
        &self,
        def: &TypeDefinition,
        value: &mut Value,
        path: &str,
    ) -> Result<(), ProjectionError> {
        match value {
            Value::Array(items) => {
                for item in items {
                    self.prune(def, item, path)?;
                }
            }
            Value::Object(object) => self.prune_object(def, object, path)?,
            _ => {}
        }
        Ok(())
    }

    fn prune_object(
        &self,
        def: &TypeDefinition,
        object: &mut Map<String, Value>,
        path: &str,
    ) -> Result<(), ProjectionError> {
        let keys: Vec<String> = object.keys().cloned().collect();

        for key in keys {
            let Some(field) = def.get(&key) else {
                continue;
            };
            let property_path = if path.is_empty() {
                key.clone()
            } else {
                format!("{path}.{key}")
            };

            if field.never_exposed {
                object.remove(&key);
                continue;
            }

            let requested = self.options.satisfies(&property_path, self.matching);
            let nested = match field.shape() {
                FieldShape::Hidden { .. } if !requested => {
                    object.remove(&key);
                    continue;
                }
                FieldShape::Association { .. } if !requested => {
                    if let Some(slot) = object.get_mut(&key) {
                        *slot = self.collapse(field.nested_type(), slot, def, &property_path)?;
                    }
                    continue;
                }
                FieldShape::Association { .. } => field.nested_type(),
                FieldShape::Hidden { nested }
                | FieldShape::Plain { nested }
                | FieldShape::Entity { nested, .. } => nested,
            };

            let Some(nested_def) = nested.and_then(|t| self.graph.get(t)) else {
                continue;
            };
            if let Some(slot) = object.get_mut(&key) {
                self.prune(nested_def, slot, &property_path)?;
            }
        }
        Ok(())
    }

    /// Collapse an association value to identifier references.
    fn collapse(
        &self,
        target: Option<&str>,
        value: &Value,
        owner: &TypeDefinition,
        path: &str,
    ) -> Result<Value, ProjectionError> {
        let id_field = target
            .and_then(|t| self.graph.get(t))
            .map_or("id", |t| t.id_field.as_str());
        let invalid = || {
            error!(path, type_name = %owner.name, "association value has no identifier");
            ProjectionError::RelationShapeInvalid {
                path: path.to_string(),
                type_name: owner.name.clone(),
            }
        };

        match value {
            Value::Null => Ok(Value::Null),
            Value::Object(object) => reference(object, id_field).ok_or_else(invalid),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_object()
                        .and_then(|object| reference(object, id_field))
                        .ok_or_else(invalid)
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            _ => Err(invalid()),
        }
    }
}

fn reference(object: &Map<String, Value>, id_field: &str) -> Option<Value> {
    let id = object.get(id_field).filter(|id| !id.is_null())?;
    let mut out = Map::new();
    out.insert(id_field.to_string(), id.clone());
    Some(Value::Object(out))
}
