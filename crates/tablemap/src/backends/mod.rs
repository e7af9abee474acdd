//! Database Backend Abstractions
//!
//! The mapping core talks to databases only through [`DatabaseExecutor`].
//! Two sqlx-backed engines ship with the crate; anything else can implement
//! the trait directly.

pub mod core;
pub mod postgres;
pub mod sqlite;

use std::sync::Arc;

pub use core::*;
pub use postgres::PostgresExecutor;
pub use sqlite::SqliteExecutor;

use crate::config::MapperConfig;
use crate::error::{ModelError, OrmResult};

/// Open the bundled engine matching the configured dialect
pub async fn connect(config: &MapperConfig) -> OrmResult<Arc<dyn DatabaseExecutor>> {
    config.validate()?;

    let url = config.database_url.as_deref().ok_or_else(|| {
        ModelError::Configuration("A database URL is required to connect".to_string())
    })?;

    match config.resolved_dialect()? {
        SqlDialect::SQLite => Ok(Arc::new(SqliteExecutor::connect(url, &config.pool).await?)),
        SqlDialect::PostgreSQL => Ok(Arc::new(PostgresExecutor::connect(url, &config.pool).await?)),
        SqlDialect::MySQL => Err(ModelError::Configuration(
            "No bundled MySQL engine; supply a DatabaseExecutor implementation".to_string(),
        )),
    }
}
