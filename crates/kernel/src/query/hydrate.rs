//! Row hydration.
//!
//! The main SELECT returns one JSON object per row, keyed by alias:
//! `{"order": {...}, "orderLines": {...} | null, ...}`. Hydration folds those
//! rows back into one object graph per root entity:
//! - roots are merged by identifier, in first-seen order
//! - each fetch join is attached under its field path in its parent
//! - to-one joins become an object or `null`, to-many joins an array
//!   de-duplicated by identifier (empty when nothing matched)
//!
//! Columns are mapped back to declared field names. A to-one relation whose
//! foreign key lives on the row is exposed as an `{id}` reference even when it
//! was not fetched.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::graph::{Cardinality, FieldKind, RelationGraph, TypeDefinition};

use super::types::{JoinEntry, QueryPlan};

#[derive(Debug, Clone)]
enum Step {
    Key(String),
    Index(usize),
}

/// Fold flat result rows into root entity objects.
pub fn hydrate(graph: &RelationGraph, plan: &QueryPlan, rows: Vec<Value>) -> Vec<Value> {
    let Some(root_def) = graph.get(&plan.root_type) else {
        return Vec::new();
    };
    let fetch: Vec<(&JoinEntry, &TypeDefinition)> = plan
        .fetch_joins()
        .filter_map(|join| graph.get(&join.target_type).map(|def| (join, def)))
        .collect();

    let mut roots: Vec<Value> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let Some(root_row) = entity_row(&row, &plan.main_alias, root_def) else {
            continue;
        };
        let key = root_row
            .get(column_of_id(root_def))
            .map(Value::to_string)
            .unwrap_or_default();
        let slot = *index.entry(key).or_insert_with(|| {
            roots.push(shape_row(graph, root_def, root_row));
            roots.len() - 1
        });

        let mut pointers: HashMap<&str, Vec<Step>> = HashMap::new();
        pointers.insert(plan.main_alias.as_str(), Vec::new());

        for (join, target) in &fetch {
            let Some(parent) = pointers.get(join.parent_alias.as_str()).cloned() else {
                continue;
            };
            let child =
                entity_row(&row, &join.alias, target).map(|r| shape_row(graph, target, r));
            if let Some(pointer) = attach(&mut roots[slot], parent, join, target, child) {
                pointers.insert(join.alias.as_str(), pointer);
            }
        }
    }

    roots
}

/// The aliased object of a row, or `None` for a null-extended join row.
fn entity_row<'r>(
    row: &'r Value,
    alias: &str,
    def: &TypeDefinition,
) -> Option<&'r Map<String, Value>> {
    let object = row.get(alias)?.as_object()?;
    match object.get(column_of_id(def)) {
        Some(id) if !id.is_null() => Some(object),
        _ => None,
    }
}

/// Map table columns to declared field names.
fn shape_row(graph: &RelationGraph, def: &TypeDefinition, row: &Map<String, Value>) -> Value {
    let id_column = column_of_id(def);
    let mut out = Map::new();

    for field in &def.fields {
        match &field.kind {
            FieldKind::Scalar { .. } | FieldKind::Embedded { .. } => {
                if let Some(value) = row.get(field.column_name()) {
                    out.insert(field.name.clone(), value.clone());
                }
            }
            FieldKind::Relation {
                cardinality: Cardinality::One,
                target,
                join,
                ..
            } if join.local != id_column => {
                let Some(value) = row.get(&join.local) else {
                    continue;
                };
                let reference = if value.is_null() {
                    Value::Null
                } else {
                    let id_field = target
                        .as_deref()
                        .and_then(|t| graph.get(t))
                        .map_or("id", |t| t.id_field.as_str());
                    let mut stub = Map::new();
                    stub.insert(id_field.to_string(), value.clone());
                    Value::Object(stub)
                };
                out.insert(field.name.clone(), reference);
            }
            FieldKind::Relation { .. } => {}
        }
    }
    Value::Object(out)
}

/// Attach `child` below the object at `steps` and return the child's location.
fn attach(
    root: &mut Value,
    mut steps: Vec<Step>,
    join: &JoinEntry,
    target: &TypeDefinition,
    child: Option<Value>,
) -> Option<Vec<Step>> {
    let (last, embedded) = join.relative.split_last()?;
    let mut holder = locate(root, &steps)?;

    for key in embedded {
        let object = holder.as_object_mut()?;
        holder = object
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if holder.is_null() {
            *holder = Value::Object(Map::new());
        }
        steps.push(Step::Key(key.clone()));
    }

    let object = holder.as_object_mut()?;
    steps.push(Step::Key(last.clone()));
    let id_field = target.id_field.as_str();

    match join.cardinality {
        Cardinality::One => {
            let Some(child) = child else {
                object.insert(last.clone(), Value::Null);
                return None;
            };
            // Rows repeat the same to-one parent; keep what earlier rows
            // already attached below it.
            let keep = matches!(
                object.get(last),
                Some(Value::Object(existing))
                    if existing.len() > 1 && existing.get(id_field) == child.get(id_field)
            );
            if !keep {
                object.insert(last.clone(), child);
            }
            Some(steps)
        }
        Cardinality::Many => {
            let slot = object
                .entry(last.clone())
                .or_insert_with(|| Value::Array(Vec::new()));
            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }
            let items = slot.as_array_mut()?;
            let child = child?;

            let id = child.get(id_field).cloned();
            let existing = items
                .iter()
                .position(|item| item.get(id_field) == id.as_ref());
            let position = match existing {
                Some(position) => position,
                None => {
                    items.push(child);
                    items.len() - 1
                }
            };
            steps.push(Step::Index(position));
            Some(steps)
        }
    }
}

fn locate<'v>(root: &'v mut Value, steps: &[Step]) -> Option<&'v mut Value> {
    steps.iter().try_fold(root, |value, step| match step {
        Step::Key(key) => value.get_mut(key.as_str()),
        Step::Index(i) => value.get_mut(*i),
    })
}

fn column_of_id(def: &TypeDefinition) -> &str {
    def.get(&def.id_field)
        .map_or(def.id_field.as_str(), |f| f.column_name())
}
