//! Schema - declarative description of a model's attributes and relationships
//!
//! A schema is declared before the model is attached to a registry, so
//! relationship targets are kept as names and only resolved on first use.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{ModelError, ModelResult};
use crate::query::Row;

/// Scalar attribute types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    /// Any JSON value
    Any,
    String,
    Integer,
    Float,
    Boolean,
    /// Arrays and objects
    Json,
}

impl ScalarType {
    /// Check whether a non-null value fits this type
    pub fn accepts(self, value: &JsonValue) -> bool {
        match self {
            ScalarType::Any => true,
            ScalarType::String => value.is_string(),
            ScalarType::Integer => value.is_i64() || value.is_u64(),
            ScalarType::Float => value.is_number(),
            ScalarType::Boolean => value.is_boolean(),
            ScalarType::Json => value.is_array() || value.is_object(),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::Any => "any",
            ScalarType::String => "string",
            ScalarType::Integer => "integer",
            ScalarType::Float => "float",
            ScalarType::Boolean => "boolean",
            ScalarType::Json => "json",
        };
        f.write_str(name)
    }
}

/// Scalar attribute descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarField {
    pub kind: ScalarType,
    pub required: bool,
}

impl ScalarField {
    pub fn new(kind: ScalarType) -> Self {
        Self {
            kind,
            required: false,
        }
    }

    /// Mark the attribute as required on write
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn check(&self, model: &str, name: &str, value: Option<&JsonValue>) -> ModelResult<()> {
        match value {
            None | Some(JsonValue::Null) if self.required => {
                Err(ModelError::validation(model, name, "value is required"))
            }
            Some(value) if !value.is_null() && !self.kind.accepts(value) => Err(
                ModelError::validation(model, name, format!("expected {}, got {}", self.kind, value)),
            ),
            _ => Ok(()),
        }
    }
}

/// Cardinality of a relationship slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    One,
    Many,
}

/// Where the foreign key of a single relationship lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum KeyLocation {
    /// The source row holds a key pointing at the target (belongs-to)
    #[default]
    Source,
    /// The target row holds a key pointing back at the source (has-one)
    Target,
}

/// Relationship descriptor; target and key names may be left to convention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDescriptor {
    pub cardinality: Cardinality,
    /// Target model name; the attribute name is used when omitted
    pub target: Option<String>,
    /// Column on the source side used for correlation
    pub local_field: Option<String>,
    /// Column on the target (or join table) side used for correlation
    pub foreign_field: Option<String>,
    /// Join table for many-to-many relationships
    pub through: Option<String>,
    pub key_location: KeyLocation,
}

impl RelationshipDescriptor {
    fn new(cardinality: Cardinality, key_location: KeyLocation) -> Self {
        Self {
            cardinality,
            target: None,
            local_field: None,
            foreign_field: None,
            through: None,
            key_location,
        }
    }

    /// Single relationship whose foreign key lives on the source row
    pub fn belongs_to() -> Self {
        Self::new(Cardinality::One, KeyLocation::Source)
    }

    /// Single relationship whose foreign key lives on the target row
    pub fn has_one() -> Self {
        Self::new(Cardinality::One, KeyLocation::Target)
    }

    /// Multiple relationship (has-many, or many-to-many with [`through`](Self::through))
    pub fn has_many() -> Self {
        Self::new(Cardinality::Many, KeyLocation::Target)
    }

    pub fn target(mut self, model: &str) -> Self {
        self.target = Some(model.to_string());
        self
    }

    pub fn local_field(mut self, column: &str) -> Self {
        self.local_field = Some(column.to_string());
        self
    }

    pub fn foreign_field(mut self, column: &str) -> Self {
        self.foreign_field = Some(column.to_string());
        self
    }

    pub fn through(mut self, join_table: &str) -> Self {
        self.through = Some(join_table.to_string());
        self
    }

    fn validate(&self, name: &str) -> ModelResult<()> {
        let invalid = |reason: &str| {
            Err(ModelError::Configuration(format!(
                "Relationship '{}' {}",
                name, reason
            )))
        };

        if self.through.is_some() && self.cardinality != Cardinality::Many {
            return invalid("declares a join table but is not a multiple relationship");
        }
        if self.cardinality == Cardinality::Many && self.key_location == KeyLocation::Source {
            return invalid("is a multiple relationship with the key on the source row");
        }
        for (label, value) in [
            ("target", &self.target),
            ("local field", &self.local_field),
            ("foreign field", &self.foreign_field),
            ("join table", &self.through),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return invalid(&format!("has an empty {}", label));
            }
        }
        Ok(())
    }
}

/// Attribute descriptor: a scalar or a relationship slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeDescriptor {
    Scalar(ScalarField),
    Relationship(RelationshipDescriptor),
}

impl AttributeDescriptor {
    pub fn any() -> ScalarField {
        ScalarField::new(ScalarType::Any)
    }

    pub fn string() -> ScalarField {
        ScalarField::new(ScalarType::String)
    }

    pub fn integer() -> ScalarField {
        ScalarField::new(ScalarType::Integer)
    }

    pub fn float() -> ScalarField {
        ScalarField::new(ScalarType::Float)
    }

    pub fn boolean() -> ScalarField {
        ScalarField::new(ScalarType::Boolean)
    }

    pub fn json() -> ScalarField {
        ScalarField::new(ScalarType::Json)
    }

    pub fn is_relationship(&self) -> bool {
        matches!(self, AttributeDescriptor::Relationship(_))
    }
}

impl From<ScalarField> for AttributeDescriptor {
    fn from(field: ScalarField) -> Self {
        AttributeDescriptor::Scalar(field)
    }
}

impl From<RelationshipDescriptor> for AttributeDescriptor {
    fn from(descriptor: RelationshipDescriptor) -> Self {
        AttributeDescriptor::Relationship(descriptor)
    }
}

impl From<ScalarType> for AttributeDescriptor {
    fn from(kind: ScalarType) -> Self {
        AttributeDescriptor::Scalar(ScalarField::new(kind))
    }
}

/// Ordered mapping of attribute name to descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    attributes: IndexMap<String, AttributeDescriptor>,
}

impl Schema {
    /// Define a schema from `(name, descriptor)` pairs, validating each descriptor's shape
    pub fn define<I, K, A>(mapping: I) -> ModelResult<Self>
    where
        I: IntoIterator<Item = (K, A)>,
        K: Into<String>,
        A: Into<AttributeDescriptor>,
    {
        let mut attributes = IndexMap::new();
        for (name, descriptor) in mapping {
            let name = name.into();
            let descriptor = descriptor.into();

            if name.trim().is_empty() || name.contains('.') {
                return Err(ModelError::Configuration(format!(
                    "Invalid attribute name '{}'",
                    name
                )));
            }
            if let AttributeDescriptor::Relationship(relationship) = &descriptor {
                relationship.validate(&name)?;
            }
            if attributes.insert(name.clone(), descriptor).is_some() {
                return Err(ModelError::Configuration(format!(
                    "Attribute '{}' is declared twice",
                    name
                )));
            }
        }
        Ok(Self { attributes })
    }

    /// Look up an attribute descriptor
    pub fn get(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.get(name)
    }

    /// Look up an attribute, failing with `NoSuchAttribute`
    pub fn attribute(&self, model: &str, name: &str) -> ModelResult<&AttributeDescriptor> {
        self.get(name)
            .ok_or_else(|| ModelError::no_such_attribute(model, name))
    }

    /// Look up a relationship slot.
    ///
    /// Unknown names fail with `NoSuchAttribute`; scalar attributes fail with
    /// `NoSuchRelationship`.
    pub fn relationship(&self, model: &str, name: &str) -> ModelResult<&RelationshipDescriptor> {
        match self.attribute(model, name)? {
            AttributeDescriptor::Relationship(relationship) => Ok(relationship),
            AttributeDescriptor::Scalar(_) => Err(ModelError::no_such_relationship(model, name)),
        }
    }

    /// Iterate relationship slots in declaration order
    pub fn relationships(&self) -> impl Iterator<Item = (&str, &RelationshipDescriptor)> {
        self.attributes.iter().filter_map(|(name, descriptor)| match descriptor {
            AttributeDescriptor::Relationship(relationship) => Some((name.as_str(), relationship)),
            AttributeDescriptor::Scalar(_) => None,
        })
    }

    /// Iterate scalar attributes in declaration order
    pub fn scalars(&self) -> impl Iterator<Item = (&str, &ScalarField)> {
        self.attributes.iter().filter_map(|(name, descriptor)| match descriptor {
            AttributeDescriptor::Scalar(field) => Some((name.as_str(), field)),
            AttributeDescriptor::Relationship(_) => None,
        })
    }

    /// Validate a full row on write: required attributes and scalar types.
    ///
    /// Columns not declared in the schema (foreign keys, for instance) are
    /// accepted as-is.
    pub fn validate_write(&self, model: &str, row: &Row) -> ModelResult<()> {
        for (name, field) in self.scalars() {
            field.check(model, name, row.get(name))?;
        }
        for (name, _) in self.relationships() {
            if row.contains_key(name) {
                return Err(ModelError::validation(
                    model,
                    name,
                    "relationship slots cannot be written as scalar values",
                ));
            }
        }
        Ok(())
    }

    /// Validate a single attribute write
    pub fn validate_value(&self, model: &str, name: &str, value: &JsonValue) -> ModelResult<()> {
        match self.get(name) {
            Some(AttributeDescriptor::Scalar(field)) => field.check(model, name, Some(value)),
            Some(AttributeDescriptor::Relationship(_)) => Err(ModelError::validation(
                model,
                name,
                "relationship slots cannot be written as scalar values",
            )),
            None => Ok(()),
        }
    }
}
