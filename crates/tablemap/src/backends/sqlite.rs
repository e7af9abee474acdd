//! SQLite Backend Implementation
//!
//! SQLite has no native UUID, datetime, boolean or JSON storage, so those
//! values are bound as text / integers and come back as whatever storage
//! class the value was written with. The hydrator coerces them back.

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Pool, Row as SqlxRow, Sqlite, TypeInfo, ValueRef};
use std::str::FromStr;
use std::time::Duration;

use super::core::*;
use crate::config::PoolConfig;
use crate::error::{ModelError, OrmResult};

/// SQLite connection pool implementation
#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    pool: Pool<Sqlite>,
}

impl SqliteExecutor {
    /// Connect a new pool with foreign-key enforcement switched on
    ///
    /// An in-memory database exists per connection, so `sqlite::memory:`
    /// URLs are pinned to a single connection that never expires.
    pub async fn connect(database_url: &str, config: &PoolConfig) -> OrmResult<Self> {
        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .foreign_keys(true)
            .create_if_missing(true);

        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

        let mut options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .test_before_acquire(config.test_before_acquire);

        if in_memory {
            options = options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else {
            options = options
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .idle_timeout(config.idle_timeout.map(Duration::from_secs))
                .max_lifetime(config.max_lifetime.map(Duration::from_secs));
        }

        let pool = options.connect_with(connect_options).await.map_err(|e| {
            tracing::error!("Failed to create SQLite pool: {}", e);
            ModelError::from(e)
        })?;

        tracing::info!("SQLite pool ready for {}", database_url);
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl DatabaseExecutor for SqliteExecutor {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::SQLite
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

fn bind_database_value<'a>(
    query: Query<'a, Sqlite, SqliteArguments<'a>>,
    value: &DatabaseValue,
) -> Query<'a, Sqlite, SqliteArguments<'a>> {
    match value {
        DatabaseValue::Null => query.bind(Option::<String>::None),
        DatabaseValue::Bool(b) => query.bind(*b),
        DatabaseValue::Integer(i) => query.bind(*i),
        DatabaseValue::Float(f) => query.bind(*f),
        DatabaseValue::String(s) => query.bind(s.clone()),
        DatabaseValue::Uuid(u) => query.bind(u.to_string()),
        DatabaseValue::DateTime(dt) => query.bind(dt.to_rfc3339()),
        DatabaseValue::Json(j) => query.bind(j.to_string()),
    }
}

fn convert_row(row: &SqliteRow) -> OrmResult<DatabaseRow> {
    let mut converted = DatabaseRow::new();
    for (index, column) in row.columns().iter().enumerate() {
        converted.push(column.name(), sqlite_value_to_database_value(row, index)?);
    }
    Ok(converted)
}

/// Decode by the value's storage class rather than the declared column type
fn sqlite_value_to_database_value(row: &SqliteRow, index: usize) -> OrmResult<DatabaseValue> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(DatabaseValue::Null);
    }
    let storage = raw.type_info().name().to_string();

    let value = match storage.as_str() {
        "INTEGER" | "BOOLEAN" => DatabaseValue::Integer(row.try_get(index)?),
        "REAL" => DatabaseValue::Float(row.try_get(index)?),
        "BLOB" => {
            let bytes: Vec<u8> = row.try_get(index)?;
            DatabaseValue::String(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => DatabaseValue::String(row.try_get(index)?),
    };

    Ok(value)
}
