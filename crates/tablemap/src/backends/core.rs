//! Core Execution Boundary
//!
//! The mapping layer never holds a live connection. It hands SQL text plus an
//! ordered list of bind values to a [`DatabaseExecutor`] and gets back either
//! an affected-row count or a list of [`DatabaseRow`]s keyed by column alias.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult, OrmResult};

/// Abstract execution engine
///
/// Implementations own pooling, drivers and transaction boundaries. A
/// cancellation observed by the engine must be reported as
/// [`ModelError::Cancelled`].
#[async_trait]
pub trait DatabaseExecutor: Send + Sync {
    /// The SQL dialect this engine speaks
    fn dialect(&self) -> SqlDialect;

    /// Execute a statement and return the affected row count
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64>;

    /// Execute a query and return all result rows
    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<DatabaseRow>>;

    /// Execute a schema statement
    async fn execute_ddl(&self, sql: &str) -> OrmResult<()>;
}

/// Database value enumeration for type-safe parameter binding
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Json(JsonValue),
}

impl DatabaseValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Short name of the variant, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            DatabaseValue::Null => "null",
            DatabaseValue::Bool(_) => "boolean",
            DatabaseValue::Integer(_) => "integer",
            DatabaseValue::Float(_) => "float",
            DatabaseValue::String(_) => "string",
            DatabaseValue::Uuid(_) => "uuid",
            DatabaseValue::DateTime(_) => "datetime",
            DatabaseValue::Json(_) => "json",
        }
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> JsonValue {
        match self {
            DatabaseValue::Null => JsonValue::Null,
            DatabaseValue::Bool(b) => JsonValue::Bool(*b),
            DatabaseValue::Integer(i) => JsonValue::Number((*i).into()),
            DatabaseValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DatabaseValue::String(s) => JsonValue::String(s.clone()),
            DatabaseValue::Uuid(u) => JsonValue::String(u.to_string()),
            DatabaseValue::DateTime(dt) => JsonValue::String(dt.to_rfc3339()),
            DatabaseValue::Json(j) => j.clone(),
        }
    }
}

impl std::fmt::Display for DatabaseValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseValue::Null => write!(f, "NULL"),
            DatabaseValue::Bool(b) => write!(f, "{}", b),
            DatabaseValue::Integer(i) => write!(f, "{}", i),
            DatabaseValue::Float(v) => write!(f, "{}", v),
            DatabaseValue::String(s) => write!(f, "{}", s),
            DatabaseValue::Uuid(u) => write!(f, "{}", u),
            DatabaseValue::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            DatabaseValue::Json(j) => write!(f, "{}", j),
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Integer(value as i64)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Integer(value)
    }
}

impl From<f64> for DatabaseValue {
    fn from(value: f64) -> Self {
        DatabaseValue::Float(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl From<Uuid> for DatabaseValue {
    fn from(value: Uuid) -> Self {
        DatabaseValue::Uuid(value)
    }
}

impl From<DateTime<Utc>> for DatabaseValue {
    fn from(value: DateTime<Utc>) -> Self {
        DatabaseValue::DateTime(value)
    }
}

impl From<JsonValue> for DatabaseValue {
    fn from(value: JsonValue) -> Self {
        DatabaseValue::Json(value)
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// Typed extraction out of a [`DatabaseValue`]
///
/// Values reaching this trait have already been coerced to the column's
/// semantic type by the hydrator, so implementations only unwrap.
pub trait FromDatabaseValue: Sized {
    fn from_database_value(value: DatabaseValue) -> ModelResult<Self>;
}

fn mismatch(expected: &str, value: &DatabaseValue) -> ModelError {
    ModelError::validation(
        "<value>",
        format!("expected {}, found {}", expected, value.kind()),
    )
}

impl FromDatabaseValue for bool {
    fn from_database_value(value: DatabaseValue) -> ModelResult<Self> {
        match value {
            DatabaseValue::Bool(b) => Ok(b),
            other => Err(mismatch("boolean", &other)),
        }
    }
}

impl FromDatabaseValue for i64 {
    fn from_database_value(value: DatabaseValue) -> ModelResult<Self> {
        match value {
            DatabaseValue::Integer(i) => Ok(i),
            other => Err(mismatch("integer", &other)),
        }
    }
}

impl FromDatabaseValue for i32 {
    fn from_database_value(value: DatabaseValue) -> ModelResult<Self> {
        let wide = i64::from_database_value(value)?;
        i32::try_from(wide)
            .map_err(|_| ModelError::validation("<value>", format!("{} does not fit in i32", wide)))
    }
}

impl FromDatabaseValue for f64 {
    fn from_database_value(value: DatabaseValue) -> ModelResult<Self> {
        match value {
            DatabaseValue::Float(f) => Ok(f),
            DatabaseValue::Integer(i) => Ok(i as f64),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl FromDatabaseValue for String {
    fn from_database_value(value: DatabaseValue) -> ModelResult<Self> {
        match value {
            DatabaseValue::String(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl FromDatabaseValue for Uuid {
    fn from_database_value(value: DatabaseValue) -> ModelResult<Self> {
        match value {
            DatabaseValue::Uuid(u) => Ok(u),
            other => Err(mismatch("uuid", &other)),
        }
    }
}

impl FromDatabaseValue for DateTime<Utc> {
    fn from_database_value(value: DatabaseValue) -> ModelResult<Self> {
        match value {
            DatabaseValue::DateTime(dt) => Ok(dt),
            other => Err(mismatch("datetime", &other)),
        }
    }
}

impl FromDatabaseValue for JsonValue {
    fn from_database_value(value: DatabaseValue) -> ModelResult<Self> {
        match value {
            DatabaseValue::Json(j) => Ok(j),
            DatabaseValue::Null => Ok(JsonValue::Null),
            other => Err(mismatch("json", &other)),
        }
    }
}

impl<T: FromDatabaseValue> FromDatabaseValue for Option<T> {
    fn from_database_value(value: DatabaseValue) -> ModelResult<Self> {
        match value {
            DatabaseValue::Null => Ok(None),
            other => T::from_database_value(other).map(Some),
        }
    }
}

/// One result row: column alias -> scalar value, in select order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseRow {
    columns: Vec<String>,
    values: Vec<DatabaseValue>,
}

impl DatabaseRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column, builder style
    pub fn with_column<T: Into<DatabaseValue>>(mut self, name: &str, value: T) -> Self {
        self.push(name, value.into());
        self
    }

    /// Append a column
    pub fn push(&mut self, name: &str, value: DatabaseValue) {
        self.columns.push(name.to_string());
        self.values.push(value);
    }

    /// Get a column value by alias
    pub fn get(&self, name: &str) -> Option<&DatabaseValue> {
        self.columns
            .iter()
            .position(|column| column == name)
            .map(|index| &self.values[index])
    }

    /// Get column names
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }
}

/// SQL dialect enumeration for generating database-specific SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDialect {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl SqlDialect {
    /// Get the parameter placeholder for the zero-based bind `index`
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index + 1),
            SqlDialect::MySQL | SqlDialect::SQLite => "?".to_string(),
        }
    }

    /// Get the quote character for identifiers in this dialect
    pub fn identifier_quote(&self) -> char {
        match self {
            SqlDialect::PostgreSQL => '"',
            SqlDialect::MySQL => '`',
            SqlDialect::SQLite => '"',
        }
    }

    /// Quote an identifier, doubling any embedded quote character
    pub fn quote(&self, identifier: &str) -> String {
        let q = self.identifier_quote();
        let escaped = identifier.replace(q, &format!("{}{}", q, q));
        format!("{}{}{}", q, escaped, q)
    }

    /// Whether `ALTER TABLE ... ADD CONSTRAINT ... FOREIGN KEY` is available
    pub fn supports_add_foreign_key(&self) -> bool {
        match self {
            SqlDialect::PostgreSQL | SqlDialect::MySQL => true,
            SqlDialect::SQLite => false,
        }
    }

    /// Whether a single-statement upsert is available
    pub fn supports_native_upsert(&self) -> bool {
        true
    }

    /// Whether `CREATE INDEX IF NOT EXISTS` is accepted
    pub fn supports_index_if_not_exists(&self) -> bool {
        match self {
            SqlDialect::PostgreSQL | SqlDialect::SQLite => true,
            SqlDialect::MySQL => false,
        }
    }

    /// Most table instances one SELECT may join, FROM table included
    pub fn max_join_tables(&self) -> usize {
        match self {
            SqlDialect::PostgreSQL => 64,
            SqlDialect::MySQL => 61,
            SqlDialect::SQLite => 64,
        }
    }

    /// LIMIT value standing in for "no limit" when only an OFFSET is given
    pub fn unbounded_limit(&self) -> Option<&'static str> {
        match self {
            SqlDialect::PostgreSQL => None,
            SqlDialect::MySQL => Some("18446744073709551615"),
            SqlDialect::SQLite => Some("-1"),
        }
    }
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlDialect::PostgreSQL => write!(f, "postgresql"),
            SqlDialect::MySQL => write!(f, "mysql"),
            SqlDialect::SQLite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for SqlDialect {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(SqlDialect::PostgreSQL),
            "mysql" => Ok(SqlDialect::MySQL),
            "sqlite" => Ok(SqlDialect::SQLite),
            _ => Err(ModelError::Configuration(format!("Unsupported database dialect: {}", s))),
        }
    }
}
