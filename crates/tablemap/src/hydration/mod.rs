//! Result Hydration
//!
//! Turns flat joined rows back into nested [`Record`]s by walking the same
//! [`JoinPlan`] the SELECT was built from. Relationship columns with a
//! joined node become nested records; everything else keeps the raw key
//! until the [`BatchLoader`] fills in what the joins did not reach.

pub mod loader;
pub mod plan;

pub use loader::BatchLoader;
pub use plan::{JoinNode, JoinPlan};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::backends::{DatabaseRow, DatabaseValue};
use crate::error::{ModelError, ModelResult};
use crate::model::{FieldType, FieldValue, Record};
use crate::schema::ColumnDescriptor;

/// Reassembles records from rows selected through a [`JoinPlan`]
#[derive(Debug, Clone, Copy)]
pub struct RowHydrator<'p> {
    plan: &'p JoinPlan,
}

impl<'p> RowHydrator<'p> {
    pub fn new(plan: &'p JoinPlan) -> Self {
        Self { plan }
    }

    /// Hydrate one row into a record of the plan's root table
    pub fn hydrate(&self, row: &DatabaseRow) -> ModelResult<Record> {
        hydrate_node(self.plan.root(), row)
    }

    /// Hydrate every row, preserving order
    pub fn hydrate_all(&self, rows: &[DatabaseRow]) -> ModelResult<Vec<Record>> {
        rows.iter().map(|row| self.hydrate(row)).collect()
    }
}

fn hydrate_node(node: &JoinNode, row: &DatabaseRow) -> ModelResult<Record> {
    let mut record = Record::new();

    for column in &node.table.columns {
        let value = read_column(node, column, row)?;

        let child = match node.child(&column.name) {
            Some(child) if !value.is_null() => child,
            _ => {
                record.set(&column.name, FieldValue::Value(value));
                continue;
            }
        };

        let joined_key = read_column(child, child.table.primary_key_column(), row)?;
        if joined_key.is_null() {
            tracing::warn!(
                "Dangling reference {}.{} = {} at '{}'; keeping the raw key",
                node.table.table_name,
                column.name,
                value,
                child.path
            );
            record.set(&column.name, FieldValue::Value(value));
            continue;
        }

        let nested = hydrate_node(child, row)?;
        record.set(&column.name, FieldValue::Entity(Box::new(nested)));
    }

    Ok(record)
}

fn read_column(
    node: &JoinNode,
    column: &ColumnDescriptor,
    row: &DatabaseRow,
) -> ModelResult<DatabaseValue> {
    let alias = node.column_alias(&column.name);
    let raw = row.get(&alias).ok_or_else(|| {
        ModelError::Hydration(format!(
            "Column '{}' ({}.{} at '{}') is missing from the result row",
            alias, node.table.table_name, column.name, node.path
        ))
    })?;
    coerce(column, raw.clone()).map_err(|e| match e {
        ModelError::Hydration(message) => ModelError::Hydration(format!(
            "{}.{}: {}",
            node.table.table_name, column.name, message
        )),
        other => other,
    })
}

/// Coerce a driver scalar to the column's semantic type
pub fn coerce(column: &ColumnDescriptor, value: DatabaseValue) -> ModelResult<DatabaseValue> {
    coerce_value(column.field_type, value)
}

/// Coerce a caller-supplied value for `column`; a mismatch is a validation
/// error on that column
pub fn coerce_field(
    column: &ColumnDescriptor,
    value: DatabaseValue,
) -> ModelResult<DatabaseValue> {
    coerce(column, value).map_err(|e| match e {
        ModelError::Hydration(message) => ModelError::validation(&column.name, message),
        other => other,
    })
}

pub(crate) fn coerce_value(
    field_type: FieldType,
    value: DatabaseValue,
) -> ModelResult<DatabaseValue> {
    use DatabaseValue as V;

    let coerced = match (field_type, value) {
        (_, V::Null) => V::Null,

        (FieldType::Text, V::String(s)) => V::String(s),
        (FieldType::Text, V::Uuid(u)) => V::String(u.to_string()),

        (FieldType::Integer, V::Integer(i)) => V::Integer(i),
        (FieldType::Integer, V::String(s)) => V::Integer(
            s.trim()
                .parse()
                .map_err(|_| mismatch(field_type, &format!("'{}'", s)))?,
        ),

        (FieldType::Float, V::Float(f)) => V::Float(f),
        (FieldType::Float, V::Integer(i)) => V::Float(i as f64),
        (FieldType::Float, V::String(s)) => V::Float(
            s.trim()
                .parse()
                .map_err(|_| mismatch(field_type, &format!("'{}'", s)))?,
        ),

        (FieldType::Boolean, V::Bool(b)) => V::Bool(b),
        (FieldType::Boolean, V::Integer(i)) => V::Bool(i != 0),
        (FieldType::Boolean, V::String(s)) => match s.to_lowercase().as_str() {
            "true" | "t" | "1" => V::Bool(true),
            "false" | "f" | "0" => V::Bool(false),
            _ => return Err(mismatch(field_type, &format!("'{}'", s))),
        },

        (FieldType::Uuid, V::Uuid(u)) => V::Uuid(u),
        (FieldType::Uuid, V::String(s)) => V::Uuid(
            Uuid::parse_str(s.trim()).map_err(|_| mismatch(field_type, &format!("'{}'", s)))?,
        ),

        (FieldType::DateTime, V::DateTime(dt)) => V::DateTime(dt),
        (FieldType::DateTime, V::String(s)) => V::DateTime(parse_datetime(&s)?),

        (FieldType::Json, V::Json(j)) => V::Json(j),
        (FieldType::Json, V::String(s)) => V::Json(serde_json::from_str::<JsonValue>(&s)?),

        (_, other) => return Err(mismatch(field_type, other.kind())),
    };

    Ok(coerced)
}

fn parse_datetime(s: &str) -> ModelResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    // SQLite's CURRENT_TIMESTAMP format, taken as UTC
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
        .map_err(|_| mismatch(FieldType::DateTime, &format!("'{}'", s)))
}

fn mismatch(field_type: FieldType, found: &str) -> ModelError {
    ModelError::Hydration(format!("cannot read {} as {}", found, field_type))
}
