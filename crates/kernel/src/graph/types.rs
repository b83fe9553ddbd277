//! Relation graph declaration types.
//!
//! These are the serde shapes of the graph document loaded at startup:
//! - TypeDefinition: an entity (has a table) or an embeddable structure
//! - FieldDeclaration: one field with its kind and exposure metadata
//! - FieldShape: the exhaustive view the projection engine matches on

use serde::{Deserialize, Serialize};

/// Entity or embeddable type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDefinition {
    /// Declared type name (e.g. "OrderBE"); the main alias derives from it.
    pub name: String,

    /// Backing table. Absent for embeddable types.
    #[serde(default)]
    pub table: Option<String>,

    /// Resource segment used in URLs and `Accept-Range`. Defaults to the main alias.
    #[serde(default)]
    pub resource: Option<String>,

    /// Identifier field name.
    #[serde(default = "default_id_field")]
    pub id_field: String,

    /// Declared fields in declaration order.
    #[serde(default)]
    pub fields: Vec<FieldDeclaration>,
}

fn default_id_field() -> String {
    "id".to_string()
}

impl TypeDefinition {
    /// Create an entity type backed by `table`.
    pub fn entity(name: &str, table: &str) -> Self {
        Self {
            name: name.to_string(),
            table: Some(table.to_string()),
            resource: None,
            id_field: default_id_field(),
            fields: Vec::new(),
        }
    }

    /// Create an embeddable type.
    pub fn embeddable(name: &str) -> Self {
        Self {
            name: name.to_string(),
            table: None,
            resource: None,
            id_field: default_id_field(),
            fields: Vec::new(),
        }
    }

    /// Append a field.
    pub fn field(mut self, field: FieldDeclaration) -> Self {
        self.fields.push(field);
        self
    }

    /// Override the resource name.
    pub fn resource(mut self, resource: &str) -> Self {
        self.resource = Some(resource.to_string());
        self
    }

    /// Look up a declared field.
    pub fn get(&self, name: &str) -> Option<&FieldDeclaration> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether this type is stored in its own table.
    pub fn is_entity(&self) -> bool {
        self.table.is_some()
    }
}

/// A single declared field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDeclaration {
    pub name: String,

    #[serde(flatten)]
    pub kind: FieldKind,

    /// Exposure metadata. `None` means the field carries no relation metadata.
    #[serde(default)]
    pub exposure: Option<ExposureClass>,

    #[serde(default)]
    pub allowed_as_option: bool,

    #[serde(default)]
    pub never_exposed: bool,

    #[serde(default)]
    pub read_only: bool,

    /// Column override; defaults to the field name.
    #[serde(default)]
    pub column: Option<String>,
}

impl FieldDeclaration {
    fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            exposure: None,
            allowed_as_option: false,
            never_exposed: false,
            read_only: false,
            column: None,
        }
    }

    /// A scalar column.
    pub fn scalar(name: &str, scalar: ScalarType) -> Self {
        Self::new(name, FieldKind::Scalar { scalar })
    }

    /// A nested structure stored inline.
    pub fn embedded(name: &str, type_name: &str) -> Self {
        Self::new(
            name,
            FieldKind::Embedded {
                type_name: type_name.to_string(),
            },
        )
    }

    /// A relation to another entity, joined on `local = foreign`.
    pub fn relation(
        name: &str,
        target: &str,
        cardinality: Cardinality,
        local: &str,
        foreign: &str,
    ) -> Self {
        Self::new(
            name,
            FieldKind::Relation {
                target: Some(target.to_string()),
                cardinality,
                fetch: FetchMode::Lazy,
                join: JoinColumns {
                    local: local.to_string(),
                    foreign: foreign.to_string(),
                },
            },
        )
    }

    pub fn exposure(mut self, exposure: ExposureClass) -> Self {
        self.exposure = Some(exposure);
        self
    }

    pub fn allowed_as_option(mut self) -> Self {
        self.allowed_as_option = true;
        self
    }

    pub fn never_exposed(mut self) -> Self {
        self.never_exposed = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn column(mut self, column: &str) -> Self {
        self.column = Some(column.to_string());
        self
    }

    /// Mark a relation as eager by mapping. No-op for other kinds.
    pub fn eager(mut self) -> Self {
        if let FieldKind::Relation { fetch, .. } = &mut self.kind {
            *fetch = FetchMode::Eager;
        }
        self
    }

    /// Column name in the backing table.
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }

    /// Whether this field is a join-able relation.
    pub fn is_relation(&self) -> bool {
        matches!(self.kind, FieldKind::Relation { .. })
    }

    /// Type reached by descending into this field, if any.
    pub fn nested_type(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Relation { target, .. } => target.as_deref(),
            FieldKind::Embedded { type_name } => Some(type_name),
            FieldKind::Scalar { .. } => None,
        }
    }

    /// Declared cardinality; scalars and embedded fields count as one.
    pub fn cardinality(&self) -> Cardinality {
        match &self.kind {
            FieldKind::Relation { cardinality, .. } => *cardinality,
            _ => Cardinality::One,
        }
    }

    /// Projection view of this field's exposure metadata.
    pub fn shape(&self) -> FieldShape<'_> {
        match self.exposure {
            None => FieldShape::Plain {
                nested: self.nested_type(),
            },
            Some(ExposureClass::None) => FieldShape::Hidden {
                nested: self.nested_type(),
            },
            Some(ExposureClass::Association) => FieldShape::Association {
                cardinality: self.cardinality(),
            },
            Some(ExposureClass::Entity) => FieldShape::Entity {
                nested: self.nested_type(),
                cardinality: self.cardinality(),
            },
        }
    }
}

/// What a field holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Scalar {
        #[serde(rename = "type", default)]
        scalar: ScalarType,
    },
    Embedded {
        #[serde(rename = "type")]
        type_name: String,
    },
    Relation {
        /// Element type. Required; a missing target is rejected when the graph is built.
        #[serde(default)]
        target: Option<String>,
        #[serde(default)]
        cardinality: Cardinality,
        #[serde(default)]
        fetch: FetchMode,
        join: JoinColumns,
    },
}

/// Scalar value types, used for filter binding and date coercion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    #[default]
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    Datetime,
    Uuid,
    Json,
}

impl ScalarType {
    /// Whether inbound values of this type go through date coercion.
    pub fn is_temporal(self) -> bool {
        matches!(self, ScalarType::Date | ScalarType::Datetime)
    }
}

/// Relation cardinality.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    #[default]
    One,
    Many,
}

/// Loading strategy declared by the persistence mapping.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    #[default]
    Lazy,
    Eager,
}

/// Join condition: `parent.local = child.foreign`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JoinColumns {
    pub local: String,
    pub foreign: String,
}

/// Exposure class governing how a field appears in responses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExposureClass {
    /// Hidden unless requested through an option.
    None,
    /// Collapsed to `{id}` unless requested through an option.
    Association,
    /// Always expanded.
    Entity,
}

/// Exhaustive projection view of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape<'a> {
    /// No exposure metadata: copied / recursed as-is.
    Plain { nested: Option<&'a str> },
    /// Exposure class `None`.
    Hidden { nested: Option<&'a str> },
    /// Exposure class `Association`.
    Association { cardinality: Cardinality },
    /// Exposure class `Entity`.
    Entity {
        nested: Option<&'a str>,
        cardinality: Cardinality,
    },
}

/// Relation metadata as seen by collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationDeclaration<'a> {
    pub field_name: &'a str,
    pub target_type: Option<&'a str>,
    pub cardinality: Cardinality,
    pub exposure_class: ExposureClass,
    pub allowed_as_option: bool,
    pub never_exposed: bool,
    pub read_only: bool,
}

impl<'a> RelationDeclaration<'a> {
    /// Build the view for a field that carries relation metadata.
    pub fn of(field: &'a FieldDeclaration) -> Option<Self> {
        if field.exposure.is_none() && !field.is_relation() && !field.allowed_as_option {
            return None;
        }
        Some(Self {
            field_name: &field.name,
            target_type: field.nested_type(),
            cardinality: field.cardinality(),
            exposure_class: field.exposure.unwrap_or(ExposureClass::None),
            allowed_as_option: field.allowed_as_option,
            never_exposed: field.never_exposed,
            read_only: field.read_only,
        })
    }
}
