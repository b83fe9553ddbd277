//! Path resolution and join registration.
//!
//! Dotted field paths are resolved against the relation graph. Every relation
//! prefix gets exactly one join whose alias is the prefix with dots replaced by
//! underscores, so resolving the same path twice is a no-op apart from the
//! monotonic `fetch_full` upgrade.

use std::collections::HashMap;

use crate::graph::{FieldKind, RelationGraph, TypeDefinition, join_alias, main_alias};

use super::error::PlanError;
use super::types::{Accessor, JoinEntry};

/// Joins registered for one query, keyed by dotted path.
#[derive(Debug)]
pub struct JoinRegistry<'g> {
    graph: &'g RelationGraph,
    root: &'g TypeDefinition,
    main_alias: String,
    joins: Vec<JoinEntry>,
    index: HashMap<String, usize>,
}

impl<'g> JoinRegistry<'g> {
    pub fn new(graph: &'g RelationGraph, root: &'g TypeDefinition) -> Self {
        Self {
            graph,
            root,
            main_alias: main_alias(&root.name),
            joins: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn main_alias(&self) -> &str {
        &self.main_alias
    }

    /// Registered joins in registration order.
    pub fn joins(&self) -> &[JoinEntry] {
        &self.joins
    }

    pub fn into_joins(self) -> Vec<JoinEntry> {
        self.joins
    }

    /// Register a join for every relation prefix of `path`.
    ///
    /// Embedded segments are walked without joining. Fails with
    /// [`PlanError::FieldInvalid`] if any segment is undeclared or a scalar
    /// segment is followed by more path.
    pub fn resolve(&mut self, path: &str, fetch_full: bool) -> Result<(), PlanError> {
        let root = self.root;
        let graph = self.graph;
        let invalid = || PlanError::field_invalid(path, &root.name);
        let segments: Vec<&str> = path.split('.').collect();

        let mut current = root;
        let mut parent_alias = self.main_alias.clone();
        let mut parent_type = root.name.clone();
        let mut relative: Vec<String> = Vec::new();

        for (i, segment) in segments.iter().enumerate() {
            let field = current.get(segment).ok_or_else(invalid)?;
            relative.push(segment.to_string());

            match &field.kind {
                FieldKind::Scalar { .. } => {
                    if i + 1 != segments.len() {
                        return Err(invalid());
                    }
                }
                FieldKind::Embedded { type_name } => {
                    current = graph.get(type_name).ok_or_else(invalid)?;
                }
                FieldKind::Relation {
                    target,
                    cardinality,
                    join,
                    ..
                } => {
                    let target = target.as_deref().ok_or_else(invalid)?;
                    let prefix = segments[..=i].join(".");

                    let alias = match self.index.get(&prefix) {
                        Some(&idx) => {
                            let entry = &mut self.joins[idx];
                            entry.fetch_full |= fetch_full;
                            entry.alias.clone()
                        }
                        None => {
                            let alias = join_alias(&prefix);
                            tracing::trace!(
                                path = %prefix,
                                alias = %alias,
                                fetch_full,
                                "registering join"
                            );
                            self.index.insert(prefix.clone(), self.joins.len());
                            self.joins.push(JoinEntry {
                                path: prefix,
                                alias: alias.clone(),
                                fetch_full,
                                parent_alias: parent_alias.clone(),
                                parent_type: parent_type.clone(),
                                relative: std::mem::take(&mut relative),
                                target_type: target.to_string(),
                                cardinality: *cardinality,
                                join: join.clone(),
                            });
                            alias
                        }
                    };

                    relative.clear();
                    parent_alias = alias;
                    parent_type = target.to_string();
                    current = graph.get(target).ok_or_else(invalid)?;
                }
            }
        }
        Ok(())
    }

    /// Accessor for `path` relative to the deepest registered ancestor join.
    pub fn accessor(&self, path: &str) -> Accessor {
        let segments: Vec<&str> = path.split('.').collect();

        for split in (1..segments.len()).rev() {
            let prefix = segments[..split].join(".");
            if let Some(&idx) = self.index.get(&prefix) {
                let join = &self.joins[idx];
                return Accessor {
                    alias: join.alias.clone(),
                    owner: join.target_type.clone(),
                    segments: segments[split..].iter().map(|s| s.to_string()).collect(),
                };
            }
        }

        Accessor {
            alias: self.main_alias.clone(),
            owner: self.root.name.clone(),
            segments: segments.iter().map(|s| s.to_string()).collect(),
        }
    }
}
