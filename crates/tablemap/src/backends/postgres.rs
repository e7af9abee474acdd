//! PostgreSQL Backend Implementation
//!
//! Execution engine over a sqlx `PgPool`. Values are bound with their native
//! types; result columns are decoded by the column's declared type name.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Pool, Postgres, Row as SqlxRow, TypeInfo, ValueRef};
use std::time::Duration;

use super::core::*;
use crate::config::PoolConfig;
use crate::error::{ModelError, OrmResult};

/// PostgreSQL connection pool implementation
#[derive(Debug, Clone)]
pub struct PostgresExecutor {
    pool: Pool<Postgres>,
}

impl PostgresExecutor {
    /// Connect a new pool
    pub async fn connect(database_url: &str, config: &PoolConfig) -> OrmResult<Self> {
        let mut options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .test_before_acquire(config.test_before_acquire);

        if let Some(idle_timeout) = config.idle_timeout {
            options = options.idle_timeout(Duration::from_secs(idle_timeout));
        }

        if let Some(max_lifetime) = config.max_lifetime {
            options = options.max_lifetime(Duration::from_secs(max_lifetime));
        }

        let pool = options.connect(database_url).await.map_err(|e| {
            tracing::error!("Failed to create PostgreSQL pool: {}", e);
            ModelError::from(e)
        })?;

        tracing::info!(
            "PostgreSQL pool ready (max: {}, min: {})",
            config.max_connections,
            config.min_connections
        );

        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl DatabaseExecutor for PostgresExecutor {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }

    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_database_value(query, param);
        }

        let result = query.execute(&self.pool).await.map_err(|e| {
            tracing::error!("Statement failed: {}", e);
            ModelError::from(e)
        })?;

        Ok(result.rows_affected())
    }

    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<DatabaseRow>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_database_value(query, param);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(|e| {
            tracing::error!("Query failed: {}", e);
            ModelError::from(e)
        })?;

        rows.iter().map(convert_row).collect()
    }

    async fn execute_ddl(&self, sql: &str) -> OrmResult<()> {
        sqlx::query(sql).execute(&self.pool).await.map_err(|e| {
            tracing::error!("Schema statement failed: {}", e);
            ModelError::from(e)
        })?;
        Ok(())
    }
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'a>(
    query: Query<'a, Postgres, PgArguments>,
    value: &DatabaseValue,
) -> Query<'a, Postgres, PgArguments> {
    match value {
        DatabaseValue::Null => query.bind(Option::<String>::None),
        DatabaseValue::Bool(b) => query.bind(*b),
        DatabaseValue::Integer(i) => query.bind(*i),
        DatabaseValue::Float(f) => query.bind(*f),
        DatabaseValue::String(s) => query.bind(s.clone()),
        DatabaseValue::Uuid(u) => query.bind(*u),
        DatabaseValue::DateTime(dt) => query.bind(*dt),
        DatabaseValue::Json(j) => query.bind(j.clone()),
    }
}

fn convert_row(row: &PgRow) -> OrmResult<DatabaseRow> {
    let mut converted = DatabaseRow::new();
    for (index, column) in row.columns().iter().enumerate() {
        converted.push(column.name(), postgres_value_to_database_value(row, index)?);
    }
    Ok(converted)
}

/// Convert a PostgreSQL column value to DatabaseValue
fn postgres_value_to_database_value(row: &PgRow, index: usize) -> OrmResult<DatabaseValue> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(DatabaseValue::Null);
    }

    let column = &row.columns()[index];
    let type_name = column.type_info().name();

    let value = match type_name {
        "BOOL" => DatabaseValue::Bool(row.try_get(index)?),
        "INT2" => DatabaseValue::Integer(row.try_get::<i16, _>(index)? as i64),
        "INT4" => DatabaseValue::Integer(row.try_get::<i32, _>(index)? as i64),
        "INT8" => DatabaseValue::Integer(row.try_get(index)?),
        "FLOAT4" => DatabaseValue::Float(row.try_get::<f32, _>(index)? as f64),
        "FLOAT8" => DatabaseValue::Float(row.try_get(index)?),
        "UUID" => DatabaseValue::Uuid(row.try_get(index)?),
        "TIMESTAMPTZ" => DatabaseValue::DateTime(row.try_get(index)?),
        "TIMESTAMP" => {
            let naive: chrono::NaiveDateTime = row.try_get(index)?;
            DatabaseValue::DateTime(chrono::DateTime::from_naive_utc_and_offset(naive, chrono::Utc))
        }
        "JSON" | "JSONB" => DatabaseValue::Json(row.try_get::<JsonValue, _>(index)?),
        _ => {
            // Fallback: try to get as string
            let value: String = row.try_get(index).map_err(|e| {
                ModelError::Hydration(format!(
                    "Failed to read column '{}' of type '{}' as text: {}",
                    column.name(),
                    type_name,
                    e
                ))
            })?;
            DatabaseValue::String(value)
        }
    };

    Ok(value)
}
