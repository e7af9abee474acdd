//! Core Model Trait - Base definition for mapped entities
//!
//! A model declares its table once through [`Model::definition`] and converts
//! to and from untyped [`Record`]s. Relationship fields are typed as
//! [`Related<M>`], which holds either the related model or just its key.

use crate::backends::DatabaseValue;
use crate::error::{ModelError, ModelResult};

use super::definition::ModelDefinition;
use super::record::{FieldValue, Record};

/// Core trait for mapped models
pub trait Model: Send + Sync + Sized + 'static {
    /// Registration-time description of the backing table
    fn definition() -> ModelDefinition;

    /// Convert model to field-value pairs for writing
    fn to_record(&self) -> Record;

    /// Build a model instance from a hydrated record
    fn from_record(record: Record) -> ModelResult<Self>;
}

/// A relationship field: the related model, or only its primary key
#[derive(Debug, Clone, PartialEq)]
pub enum Related<M> {
    Entity(Box<M>),
    Key(DatabaseValue),
}

impl<M: Model> Related<M> {
    pub fn entity(model: M) -> Self {
        Related::Entity(Box::new(model))
    }

    pub fn key(key: impl Into<DatabaseValue>) -> Self {
        Related::Key(key.into())
    }

    pub fn as_entity(&self) -> Option<&M> {
        match self {
            Related::Entity(m) => Some(m),
            Related::Key(_) => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Related::Entity(_))
    }

    pub fn to_field_value(&self) -> FieldValue {
        match self {
            Related::Entity(m) => FieldValue::Entity(Box::new(m.to_record())),
            Related::Key(k) => FieldValue::Value(k.clone()),
        }
    }

    pub fn from_field_value(value: FieldValue) -> ModelResult<Self> {
        match value {
            FieldValue::Entity(record) => M::from_record(*record).map(Related::entity),
            FieldValue::Value(key) => Ok(Related::Key(key)),
            FieldValue::List(_) => Err(ModelError::validation(
                "<relationship>",
                "expected a related record or key, found a list",
            )),
        }
    }
}

impl<M: Model> From<&Related<M>> for FieldValue {
    fn from(related: &Related<M>) -> Self {
        related.to_field_value()
    }
}

impl<M: Model> From<&Option<Related<M>>> for FieldValue {
    fn from(related: &Option<Related<M>>) -> Self {
        match related {
            Some(r) => r.to_field_value(),
            None => FieldValue::Value(DatabaseValue::Null),
        }
    }
}
