//! Mapper configuration
//!
//! Everything the [`Database`](crate::database::Database) context needs before
//! it can register tables: where the database lives, which dialect it speaks,
//! pool sizing for the bundled engines, and the mapping knobs.

use std::env;
use std::str::FromStr;

use crate::backends::SqlDialect;
use crate::error::{ModelError, ModelResult};

/// Default bound on relationship traversal depth
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Default number of keys per follow-up `IN` query
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Connection pool configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
    pub idle_timeout: Option<u64>,
    pub max_lifetime: Option<u64>,
    pub test_before_acquire: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: 30,
            idle_timeout: Some(600), // 10 minutes
            max_lifetime: Some(1800), // 30 minutes
            test_before_acquire: true,
        }
    }
}

/// How `upsert` is carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStrategy {
    /// One atomic `INSERT ... ON CONFLICT` / `ON DUPLICATE KEY` statement
    Native,
    /// Plain insert, then an update when the insert hits a key collision
    InsertThenUpdate,
}

impl FromStr for UpsertStrategy {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "native" => Ok(UpsertStrategy::Native),
            "insert_then_update" | "fallback" => Ok(UpsertStrategy::InsertThenUpdate),
            _ => Err(ModelError::Configuration(format!(
                "Invalid upsert strategy '{}': expected native or insert_then_update",
                s
            ))),
        }
    }
}

/// Mapper configuration
#[derive(Debug, Clone)]
pub struct MapperConfig {
    pub database_url: Option<String>,
    pub dialect: Option<SqlDialect>,
    pub pool: PoolConfig,
    pub max_depth: usize,
    /// Keys bound per follow-up query when loading past the joined levels
    pub batch_size: usize,
    pub upsert_strategy: UpsertStrategy,
    pub create_tables: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            dialect: None,
            pool: PoolConfig::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            batch_size: DEFAULT_BATCH_SIZE,
            upsert_strategy: UpsertStrategy::Native,
            create_tables: true,
        }
    }
}

impl MapperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration pointing at `url`, dialect inferred from its scheme
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            database_url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn upsert_strategy(mut self, strategy: UpsertStrategy) -> Self {
        self.upsert_strategy = strategy;
        self
    }

    pub fn create_tables(mut self, create_tables: bool) -> Self {
        self.create_tables = create_tables;
        self
    }

    /// Load configuration from environment variables
    ///
    /// Reads `DATABASE_URL`, `TABLEMAP_DIALECT`, `TABLEMAP_MAX_DEPTH`,
    /// `TABLEMAP_BATCH_SIZE`, `TABLEMAP_UPSERT_STRATEGY`, `TABLEMAP_CREATE_TABLES`,
    /// `TABLEMAP_MAX_CONNECTIONS` and `TABLEMAP_MIN_CONNECTIONS`.
    pub fn from_env() -> ModelResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> ModelResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        config.database_url = lookup("DATABASE_URL");

        if let Some(dialect) = lookup("TABLEMAP_DIALECT") {
            config.dialect = Some(dialect.parse()?);
        }

        if let Some(depth) = lookup("TABLEMAP_MAX_DEPTH") {
            config.max_depth = parse_number("TABLEMAP_MAX_DEPTH", &depth)?;
        }

        if let Some(size) = lookup("TABLEMAP_BATCH_SIZE") {
            config.batch_size = parse_number("TABLEMAP_BATCH_SIZE", &size)?;
        }

        if let Some(strategy) = lookup("TABLEMAP_UPSERT_STRATEGY") {
            config.upsert_strategy = strategy.parse()?;
        }

        if let Some(create) = lookup("TABLEMAP_CREATE_TABLES") {
            config.create_tables = create.parse().map_err(|_| {
                ModelError::Configuration(format!(
                    "Invalid TABLEMAP_CREATE_TABLES '{}': expected true or false",
                    create
                ))
            })?;
        }

        if let Some(max) = lookup("TABLEMAP_MAX_CONNECTIONS") {
            config.pool.max_connections = parse_number("TABLEMAP_MAX_CONNECTIONS", &max)?;
        }

        if let Some(min) = lookup("TABLEMAP_MIN_CONNECTIONS") {
            config.pool.min_connections = parse_number("TABLEMAP_MIN_CONNECTIONS", &min)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ModelResult<()> {
        if let Some(url) = &self.database_url {
            let inferred = dialect_from_url(url)?;
            if let Some(explicit) = self.dialect {
                if explicit != inferred {
                    return Err(ModelError::Configuration(format!(
                        "Dialect {} does not match database URL scheme ({})",
                        explicit, inferred
                    )));
                }
            }
        }

        if self.batch_size == 0 {
            return Err(ModelError::Configuration(
                "batch_size must be greater than zero".to_string(),
            ));
        }

        if self.pool.max_connections == 0 {
            return Err(ModelError::Configuration(
                "max_connections must be greater than zero".to_string(),
            ));
        }

        if self.pool.min_connections > self.pool.max_connections {
            return Err(ModelError::Configuration(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.pool.min_connections, self.pool.max_connections
            )));
        }

        Ok(())
    }

    /// The dialect to generate SQL for: explicit, else inferred from the URL
    pub fn resolved_dialect(&self) -> ModelResult<SqlDialect> {
        if let Some(dialect) = self.dialect {
            return Ok(dialect);
        }
        match &self.database_url {
            Some(url) => dialect_from_url(url),
            None => Err(ModelError::Configuration(
                "Neither a dialect nor a database URL is configured".to_string(),
            )),
        }
    }
}

fn parse_number<T: FromStr>(field: &str, value: &str) -> ModelResult<T> {
    value.parse().map_err(|_| {
        ModelError::Configuration(format!("Invalid {} '{}': expected a number", field, value))
    })
}

/// Infer the dialect from a database URL scheme
pub fn dialect_from_url(database_url: &str) -> ModelResult<SqlDialect> {
    let parsed = url::Url::parse(database_url).map_err(|e| {
        ModelError::Configuration(format!("Invalid database URL '{}': {}", database_url, e))
    })?;

    match parsed.scheme() {
        "postgres" | "postgresql" => Ok(SqlDialect::PostgreSQL),
        "mysql" | "mariadb" => Ok(SqlDialect::MySQL),
        "sqlite" => Ok(SqlDialect::SQLite),
        other => Err(ModelError::Configuration(format!(
            "Unsupported database URL scheme: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_dialect_inferred_from_url() {
        assert_eq!(dialect_from_url("sqlite::memory:").unwrap(), SqlDialect::SQLite);
        assert_eq!(
            dialect_from_url("postgres://user@localhost/app").unwrap(),
            SqlDialect::PostgreSQL
        );
        assert!(dialect_from_url("redis://localhost").is_err());
        assert!(dialect_from_url("not a url").is_err());
    }

    #[test]
    fn test_from_lookup_reads_overrides() {
        let config = MapperConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("TABLEMAP_MAX_DEPTH", "3"),
            ("TABLEMAP_BATCH_SIZE", "50"),
            ("TABLEMAP_UPSERT_STRATEGY", "insert_then_update"),
            ("TABLEMAP_CREATE_TABLES", "false"),
        ]))
        .unwrap();

        assert_eq!(config.max_depth, 3);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.upsert_strategy, UpsertStrategy::InsertThenUpdate);
        assert!(!config.create_tables);
        assert_eq!(config.resolved_dialect().unwrap(), SqlDialect::SQLite);
    }

    #[test]
    fn test_validation_failures() {
        let err = MapperConfig::from_lookup(lookup(&[("TABLEMAP_MAX_DEPTH", "deep")])).unwrap_err();
        assert!(matches!(err, ModelError::Configuration(_)));

        let mismatched = MapperConfig::with_url("sqlite::memory:").dialect(SqlDialect::PostgreSQL);
        assert!(mismatched.validate().is_err());

        assert!(MapperConfig::new().batch_size(0).validate().is_err());

        let mut config = MapperConfig::new();
        config.pool.min_connections = 20;
        assert!(config.validate().is_err());

        assert!(MapperConfig::new().resolved_dialect().is_err());
    }
}
