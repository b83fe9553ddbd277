//! Immutable relation graph.
//!
//! Built once at startup (from YAML or through [`RelationGraphBuilder`]) and
//! shared behind an `Arc`. Nothing mutates it after [`RelationGraphBuilder::build`]
//! has validated it.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use super::alias::main_alias;
use super::types::{
    ExposureClass, FetchMode, FieldDeclaration, FieldKind, RelationDeclaration, TypeDefinition,
};

/// Graph misconfiguration detected while registering metadata.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("failed to parse relation graph: {0}")]
    Parse(#[from] serde_yml::Error),

    #[error("type '{0}' is declared more than once")]
    DuplicateType(String),

    #[error("field '{field}' is declared more than once on '{type_name}'")]
    DuplicateField { type_name: String, field: String },

    #[error("resource '{0}' is used by more than one type")]
    DuplicateResource(String),

    #[error("relation '{field}' on '{type_name}' has no element type")]
    MissingElementType { type_name: String, field: String },

    #[error("field '{field}' on '{type_name}' refers to unknown type '{target}'")]
    UnknownTarget {
        type_name: String,
        field: String,
        target: String,
    },

    #[error("relation '{field}' on '{type_name}' targets '{target}', which has no table")]
    NotAnEntity {
        type_name: String,
        field: String,
        target: String,
    },

    #[error("always-joined relations form a cycle: {0}")]
    EagerCycle(String),

    #[error("unknown type '{0}'")]
    UnknownType(String),
}

#[derive(Debug, Deserialize)]
struct GraphDocument {
    #[serde(default)]
    types: Vec<TypeDefinition>,
}

/// Per-type relation and field metadata.
#[derive(Debug)]
pub struct RelationGraph {
    types: Vec<TypeDefinition>,
    by_name: HashMap<String, usize>,
    by_resource: HashMap<String, usize>,
}

impl RelationGraph {
    pub fn builder() -> RelationGraphBuilder {
        RelationGraphBuilder::default()
    }

    /// Parse and validate a YAML graph document.
    pub fn from_yaml_str(source: &str) -> Result<Self, GraphError> {
        let document: GraphDocument = serde_yml::from_str(source)?;
        document
            .types
            .into_iter()
            .fold(Self::builder(), RelationGraphBuilder::register)
            .build()
    }

    /// Load the graph document from disk.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read relation graph {}", path.display()))?;
        let graph = Self::from_yaml_str(&source)
            .with_context(|| format!("invalid relation graph {}", path.display()))?;
        info!(
            path = %path.display(),
            types = graph.types.len(),
            "relation graph loaded"
        );
        Ok(graph)
    }

    /// Look up a type by declared name.
    pub fn get(&self, type_name: &str) -> Option<&TypeDefinition> {
        self.by_name.get(type_name).map(|&i| &self.types[i])
    }

    /// Look up a type, failing with [`GraphError::UnknownType`].
    pub fn require(&self, type_name: &str) -> Result<&TypeDefinition, GraphError> {
        self.get(type_name)
            .ok_or_else(|| GraphError::UnknownType(type_name.to_string()))
    }

    /// Look up an entity type by its resource name.
    pub fn by_resource(&self, resource: &str) -> Option<&TypeDefinition> {
        self.by_resource.get(resource).map(|&i| &self.types[i])
    }

    /// All registered types, in registration order.
    pub fn types(&self) -> impl Iterator<Item = &TypeDefinition> {
        self.types.iter()
    }

    /// Resource name of a type (explicit, else its main alias).
    pub fn resource_name(def: &TypeDefinition) -> String {
        def.resource.clone().unwrap_or_else(|| main_alias(&def.name))
    }

    /// Declared field of a type.
    pub fn field(&self, type_name: &str, field: &str) -> Option<&FieldDeclaration> {
        self.get(type_name).and_then(|def| def.get(field))
    }

    /// Fields carrying relation metadata, in declaration order.
    pub fn declared_relations(&self, type_name: &str) -> Vec<RelationDeclaration<'_>> {
        self.get(type_name)
            .map(|def| {
                def.fields
                    .iter()
                    .filter_map(RelationDeclaration::of)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Scalar and embedded field names, in declaration order.
    pub fn declared_scalar_fields(&self, type_name: &str) -> Vec<&str> {
        self.get(type_name)
            .map(|def| {
                def.fields
                    .iter()
                    .filter(|f| !f.is_relation())
                    .map(|f| f.name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether the persistence mapping loads this relation eagerly.
    pub fn is_eager_by_mapping(&self, type_name: &str, field: &str) -> bool {
        matches!(
            self.field(type_name, field).map(|f| &f.kind),
            Some(FieldKind::Relation {
                fetch: FetchMode::Eager,
                ..
            })
        )
    }

    /// Walk a dotted path from `root` and return the terminal field with its owner.
    ///
    /// Every segment but the last must lead into a nested type (relation target
    /// or embedded structure). Returns `None` for any undeclared segment.
    pub fn field_at_path<'g>(
        &'g self,
        root: &str,
        path: &str,
    ) -> Option<(&'g TypeDefinition, &'g FieldDeclaration)> {
        let mut owner = self.get(root)?;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let field = owner.get(segment)?;
            if segments.peek().is_none() {
                return Some((owner, field));
            }
            owner = self.get(field.nested_type()?)?;
        }
        None
    }
}

/// Collects type definitions and validates them into a [`RelationGraph`].
#[derive(Debug, Default)]
pub struct RelationGraphBuilder {
    types: Vec<TypeDefinition>,
}

impl RelationGraphBuilder {
    /// Register a type definition.
    pub fn register(mut self, def: TypeDefinition) -> Self {
        self.types.push(def);
        self
    }

    /// Validate all declarations and freeze the graph.
    pub fn build(self) -> Result<RelationGraph, GraphError> {
        let mut by_name = HashMap::new();
        let mut by_resource = HashMap::new();

        for (i, def) in self.types.iter().enumerate() {
            if by_name.insert(def.name.clone(), i).is_some() {
                return Err(GraphError::DuplicateType(def.name.clone()));
            }
            if def.is_entity() {
                let resource = RelationGraph::resource_name(def);
                if by_resource.insert(resource.clone(), i).is_some() {
                    return Err(GraphError::DuplicateResource(resource));
                }
            }
        }

        let graph = RelationGraph {
            types: self.types,
            by_name,
            by_resource,
        };

        for def in &graph.types {
            validate_fields(&graph, def)?;
        }
        for def in graph.types.iter().filter(|d| d.is_entity()) {
            check_eager_cycles(&graph, def, &mut Vec::new())?;
        }

        Ok(graph)
    }
}

fn validate_fields(graph: &RelationGraph, def: &TypeDefinition) -> Result<(), GraphError> {
    let mut seen = HashSet::new();
    for field in &def.fields {
        if !seen.insert(field.name.as_str()) {
            return Err(GraphError::DuplicateField {
                type_name: def.name.clone(),
                field: field.name.clone(),
            });
        }

        let (target, needs_table) = match &field.kind {
            FieldKind::Scalar { .. } => continue,
            FieldKind::Embedded { type_name } => (type_name.as_str(), false),
            FieldKind::Relation { target, .. } => {
                let target = target
                    .as_deref()
                    .ok_or_else(|| GraphError::MissingElementType {
                        type_name: def.name.clone(),
                        field: field.name.clone(),
                    })?;
                (target, true)
            }
        };

        let target_def = graph.get(target).ok_or_else(|| GraphError::UnknownTarget {
            type_name: def.name.clone(),
            field: field.name.clone(),
            target: target.to_string(),
        })?;
        if needs_table && !target_def.is_entity() {
            return Err(GraphError::NotAnEntity {
                type_name: def.name.clone(),
                field: field.name.clone(),
                target: target.to_string(),
            });
        }
    }
    Ok(())
}

/// Whether the eager-join pass includes this relation regardless of options.
pub(crate) fn always_joined(field: &FieldDeclaration) -> bool {
    match &field.kind {
        FieldKind::Relation { fetch, .. } => {
            *fetch == FetchMode::Eager
                || matches!(
                    field.exposure,
                    Some(ExposureClass::Entity | ExposureClass::Association)
                )
        }
        _ => false,
    }
}

/// Depth-first search over always-joined relations, failing on a back edge.
fn check_eager_cycles<'g>(
    graph: &'g RelationGraph,
    def: &'g TypeDefinition,
    chain: &mut Vec<(&'g str, &'g str)>,
) -> Result<(), GraphError> {
    for field in def.fields.iter().filter(|f| always_joined(f)) {
        let Some(target) = field.nested_type() else {
            continue;
        };
        chain.push((def.name.as_str(), field.name.as_str()));

        if chain.iter().any(|(t, _)| *t == target) {
            let mut rendered: Vec<String> =
                chain.iter().map(|(t, f)| format!("{t}.{f}")).collect();
            rendered.push(target.to_string());
            return Err(GraphError::EagerCycle(rendered.join(" -> ")));
        }

        if let Some(next) = graph.get(target) {
            check_eager_cycles(graph, next, chain)?;
        }
        chain.pop();
    }
    Ok(())
}
