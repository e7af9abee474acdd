//! Record validation
//!
//! Every record passes through a [`RecordValidator`] before it is written.
//! The default [`DescriptorValidator`] checks a record against the table
//! descriptor and normalizes scalars to the column types.

use async_trait::async_trait;

use crate::backends::DatabaseValue;
use crate::error::{ModelError, ModelResult};
use crate::hydration::coerce_field;
use crate::model::{FieldValue, Record};
use crate::schema::TableDescriptor;

/// Schema-validation boundary
#[async_trait]
pub trait RecordValidator: Send + Sync {
    /// Validate `record` for `table`, returning the normalized record
    async fn validate_record(&self, table: &TableDescriptor, record: Record) -> ModelResult<Record>;
}

/// Validates records against column types, nullability and lengths
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorValidator;

#[async_trait]
impl RecordValidator for DescriptorValidator {
    async fn validate_record(
        &self,
        table: &TableDescriptor,
        record: Record,
    ) -> ModelResult<Record> {
        validate_against(table, record)
    }
}

/// Synchronous core of [`DescriptorValidator`]
pub fn validate_against(table: &TableDescriptor, mut record: Record) -> ModelResult<Record> {
    // Hydrated reverse relationships are read-only and dropped here
    let unknown = record
        .field_names()
        .find(|name| table.column(name).is_none() && table.back_reference(name).is_none());
    if let Some(unknown) = unknown {
        return Err(ModelError::validation(
            unknown,
            format!("not a column of table '{}'", table.table_name),
        ));
    }

    let mut validated = Record::new();

    for column in &table.columns {
        let value = record
            .remove(&column.name)
            .unwrap_or(FieldValue::Value(DatabaseValue::Null));

        if value.is_null() {
            if !column.nullable {
                return Err(ModelError::validation(&column.name, "must not be null"));
            }
            validated.set(&column.name, value);
            continue;
        }

        let value = match value {
            FieldValue::Value(scalar) => {
                let normalized = coerce_field(column, scalar)?;
                if let (Some(max), DatabaseValue::String(s)) = (column.max_length, &normalized) {
                    let length = s.chars().count();
                    if length > max as usize {
                        return Err(ModelError::validation(
                            &column.name,
                            format!("length {} exceeds maximum of {}", length, max),
                        ));
                    }
                }
                FieldValue::Value(normalized)
            }
            FieldValue::Entity(nested) => {
                let relation = column.relation.as_ref().ok_or_else(|| {
                    ModelError::validation(&column.name, "nested record given for a scalar column")
                })?;
                match nested.value(&relation.target_column) {
                    Some(key) if !key.is_null() => {}
                    _ => {
                        return Err(ModelError::validation(
                            &column.name,
                            format!("nested record has no '{}' key", relation.target_column),
                        ))
                    }
                }
                FieldValue::Entity(nested)
            }
            FieldValue::List(_) => {
                return Err(ModelError::validation(
                    &column.name,
                    "a list of records cannot be stored in a column",
                ))
            }
        };

        validated.set(&column.name, value);
    }

    Ok(validated)
}
