//! Model definitions
//!
//! A [`ModelDefinition`] is the registration-time description of a model:
//! its table name, fields in declaration order, the primary key, and the
//! index / uniqueness declarations. The metadata extractor turns it into a
//! table descriptor; nothing here is validated until then.

use std::any::{type_name, TypeId};
use serde::{Deserialize, Serialize};

use super::core_trait::Model;

/// Semantic scalar type of a stored column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Text,
    Integer,
    Float,
    Boolean,
    Uuid,
    DateTime,
    /// Structured value stored as JSON
    Json,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Text => write!(f, "text"),
            FieldType::Integer => write!(f, "integer"),
            FieldType::Float => write!(f, "float"),
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Uuid => write!(f, "uuid"),
            FieldType::DateTime => write!(f, "datetime"),
            FieldType::Json => write!(f, "json"),
        }
    }
}

/// Identity of a referenced model
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModelRef {
    /// A Rust type implementing [`Model`]
    Type { id: TypeId, name: &'static str },
    /// A table registered by name, without a Rust type
    Table(String),
}

impl ModelRef {
    pub fn of<M: Model>() -> Self {
        ModelRef::Type {
            id: TypeId::of::<M>(),
            name: type_name::<M>(),
        }
    }
}

impl std::fmt::Display for ModelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelRef::Type { name, .. } => write!(f, "{}", name),
            ModelRef::Table(table) => write!(f, "table '{}'", table),
        }
    }
}

/// Declared type of a field
#[derive(Debug, Clone, PartialEq)]
pub enum DeclaredType {
    Scalar(FieldType),
    /// Another mapped model, or that model's primary key
    Reference(ModelRef),
}

/// One declared field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    pub declared: DeclaredType,
    pub nullable: bool,
    pub max_length: Option<u32>,
    /// Override for the name of the reverse relationship
    pub back_reference: Option<String>,
}

impl FieldDefinition {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            declared: DeclaredType::Scalar(field_type),
            nullable: false,
            max_length: None,
            back_reference: None,
        }
    }

    pub fn reference(name: &str, target: ModelRef) -> Self {
        Self {
            name: name.to_string(),
            declared: DeclaredType::Reference(target),
            nullable: false,
            max_length: None,
            back_reference: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn back_reference(mut self, name: &str) -> Self {
        self.back_reference = Some(name.to_string());
        self
    }
}

/// Registration-time model description
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDefinition {
    pub table_name: String,
    pub fields: Vec<FieldDefinition>,
    pub primary_key: Option<String>,
    pub indexes: Vec<String>,
    pub unique: Vec<String>,
    pub unique_together: Vec<Vec<String>>,
    /// `(field, reverse name)` requests, checked at extraction
    pub back_references: Vec<(String, String)>,
}

impl ModelDefinition {
    pub fn new(table_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            fields: Vec::new(),
            primary_key: None,
            indexes: Vec::new(),
            unique: Vec::new(),
            unique_together: Vec::new(),
            back_references: Vec::new(),
        }
    }

    /// Add a non-nullable scalar field
    pub fn field(self, name: &str, field_type: FieldType) -> Self {
        self.column(FieldDefinition::new(name, field_type))
    }

    /// Add a nullable scalar field
    pub fn optional(self, name: &str, field_type: FieldType) -> Self {
        self.column(FieldDefinition::new(name, field_type).nullable())
    }

    /// Add a text field with a maximum length
    pub fn text(self, name: &str, max_length: u32) -> Self {
        self.column(FieldDefinition::new(name, FieldType::Text).max_length(max_length))
    }

    /// Add a fully specified field
    pub fn column(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a non-nullable relationship to `M`
    pub fn reference<M: Model>(self, name: &str) -> Self {
        self.column(FieldDefinition::reference(name, ModelRef::of::<M>()))
    }

    /// Add a nullable relationship to `M`
    pub fn optional_reference<M: Model>(self, name: &str) -> Self {
        self.column(FieldDefinition::reference(name, ModelRef::of::<M>()).nullable())
    }

    /// Add a relationship to a table registered by name
    pub fn reference_table(self, name: &str, table: &str, nullable: bool) -> Self {
        let field = FieldDefinition::reference(name, ModelRef::Table(table.to_string()));
        self.column(if nullable { field.nullable() } else { field })
    }

    /// Name the reverse relationship of a reference field
    ///
    /// A named reverse relationship is hydrated as a list of owner records.
    pub fn back_reference(mut self, field: &str, name: &str) -> Self {
        self.back_references.push((field.to_string(), name.to_string()));
        self
    }

    pub fn primary_key(mut self, name: &str) -> Self {
        self.primary_key = Some(name.to_string());
        self
    }

    pub fn index(mut self, name: &str) -> Self {
        self.indexes.push(name.to_string());
        self
    }

    pub fn unique(mut self, name: &str) -> Self {
        self.unique.push(name.to_string());
        self
    }

    pub fn unique_together(mut self, names: &[&str]) -> Self {
        self.unique_together
            .push(names.iter().map(|n| n.to_string()).collect());
        self
    }
}
