//! Untyped records
//!
//! A [`Record`] is a field name -> value map. It is what the table handle
//! writes and what the hydrator produces; typed models convert to and from
//! it through [`Model`](super::Model).

use std::collections::HashMap;
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::core_trait::{Model, Related};
use crate::backends::{DatabaseValue, FromDatabaseValue};
use crate::error::{ModelError, ModelResult};

/// Value held by one record field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A scalar, or the raw key of a relationship
    Value(DatabaseValue),
    /// A fully populated related record
    Entity(Box<Record>),
    /// Records of a reverse relationship
    List(Vec<Record>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Value(DatabaseValue::Null))
    }

    pub fn as_value(&self) -> Option<&DatabaseValue> {
        match self {
            FieldValue::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Record> {
        match self {
            FieldValue::Entity(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Record]> {
        match self {
            FieldValue::List(records) => Some(records.as_slice()),
            _ => None,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            FieldValue::Value(v) => v.to_json(),
            FieldValue::Entity(r) => r.to_json(),
            FieldValue::List(records) => {
                JsonValue::Array(records.iter().map(Record::to_json).collect())
            }
        }
    }
}

impl From<DatabaseValue> for FieldValue {
    fn from(value: DatabaseValue) -> Self {
        FieldValue::Value(value)
    }
}

impl From<Record> for FieldValue {
    fn from(record: Record) -> Self {
        FieldValue::Entity(Box::new(record))
    }
}

/// Field name -> value map
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: HashMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a scalar (or raw key) field, builder style
    pub fn with<T: Into<DatabaseValue>>(mut self, name: &str, value: T) -> Self {
        self.set(name, FieldValue::Value(value.into()));
        self
    }

    /// Set a nested record field, builder style
    pub fn with_entity(mut self, name: &str, record: Record) -> Self {
        self.set(name, FieldValue::Entity(Box::new(record)));
        self
    }

    pub fn set(&mut self, name: &str, value: FieldValue) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    /// Scalar value of a field, `None` if absent or nested
    pub fn value(&self, name: &str) -> Option<&DatabaseValue> {
        self.fields.get(name).and_then(FieldValue::as_value)
    }

    /// Nested record of a field, `None` if absent or a raw value
    pub fn entity(&self, name: &str) -> Option<&Record> {
        self.fields.get(name).and_then(FieldValue::as_entity)
    }

    pub(crate) fn entity_mut(&mut self, name: &str) -> Option<&mut Record> {
        match self.fields.get_mut(name) {
            Some(FieldValue::Entity(record)) => Some(&mut **record),
            _ => None,
        }
    }

    /// Records of a reverse relationship, `None` if it was not hydrated
    pub fn list(&self, name: &str) -> Option<&[Record]> {
        self.fields.get(name).and_then(FieldValue::as_list)
    }

    /// Take a scalar field out, converted to `T`
    pub fn take<T: FromDatabaseValue>(&mut self, name: &str) -> ModelResult<T> {
        match self.fields.remove(name) {
            Some(FieldValue::Value(value)) => T::from_database_value(value).map_err(|e| match e {
                ModelError::Validation { message, .. } => ModelError::validation(name, message),
                other => other,
            }),
            Some(FieldValue::Entity(_)) | Some(FieldValue::List(_)) => Err(
                ModelError::validation(name, "expected a scalar value, found nested records"),
            ),
            None => Err(ModelError::validation(name, "field is missing")),
        }
    }

    /// Take a relationship field out as a typed [`Related`]
    pub fn take_related<M: Model>(&mut self, name: &str) -> ModelResult<Related<M>> {
        match self.fields.remove(name) {
            Some(FieldValue::Value(DatabaseValue::Null)) | None => {
                Err(ModelError::validation(name, "relationship is required"))
            }
            Some(value) => Related::from_field_value(value),
        }
    }

    /// Take a hydrated reverse relationship out; empty when it was not hydrated
    pub fn take_many<M: Model>(&mut self, name: &str) -> ModelResult<Vec<M>> {
        match self.fields.remove(name) {
            Some(FieldValue::List(records)) => records.into_iter().map(M::from_record).collect(),
            None => Ok(Vec::new()),
            Some(_) => Err(ModelError::validation(name, "expected a list of records")),
        }
    }

    /// Take a nullable relationship field out
    pub fn take_optional_related<M: Model>(
        &mut self,
        name: &str,
    ) -> ModelResult<Option<Related<M>>> {
        match self.fields.remove(name) {
            Some(FieldValue::Value(DatabaseValue::Null)) | None => Ok(None),
            Some(value) => Related::from_field_value(value).map(Some),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        let map = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        JsonValue::Object(map)
    }
}

impl FromIterator<(String, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, FieldValue);
    type IntoIter = std::collections::hash_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_converts_and_names_the_field() {
        let mut record = Record::new()
            .with("id", 1i64)
            .with("sweetener", DatabaseValue::Null)
            .with("name", "mocha");

        assert_eq!(record.take::<i64>("id").unwrap(), 1);
        assert_eq!(record.take::<Option<String>>("sweetener").unwrap(), None);

        let err = record.take::<i64>("name").unwrap_err();
        assert!(matches!(err, ModelError::Validation { ref field, .. } if field == "name"));

        let err = record.take::<i64>("absent").unwrap_err();
        assert!(matches!(err, ModelError::Validation { ref field, .. } if field == "absent"));
    }

    #[test]
    fn test_nested_json_shape() {
        let record = Record::new()
            .with("id", 1i64)
            .with_entity("flavor", Record::new().with("id", 2i64).with("name", "mocha"));

        assert_eq!(
            record.to_json(),
            serde_json::json!({"id": 1, "flavor": {"id": 2, "name": "mocha"}})
        );
        assert_eq!(
            record.entity("flavor").and_then(|f| f.value("name")),
            Some(&DatabaseValue::String("mocha".into()))
        );
    }

    #[test]
    fn test_reverse_relationship_list() {
        let mut record = Record::new().with("id", 1i64);
        record.set(
            "coffees",
            FieldValue::List(vec![Record::new().with("id", 7i64), Record::new().with("id", 8i64)]),
        );

        assert_eq!(record.list("coffees").map(<[Record]>::len), Some(2));
        assert_eq!(
            record.to_json(),
            serde_json::json!({"id": 1, "coffees": [{"id": 7}, {"id": 8}]})
        );
        assert!(record.take::<i64>("coffees").is_err());
        assert!(record.list("missing").is_none());
    }
}
