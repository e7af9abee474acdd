//! Database context
//!
//! [`DatabaseBuilder`] collects table registrations; [`DatabaseBuilder::initialize`]
//! resolves relationships, creates the schema and returns the immutable
//! [`Database`] every table handle shares.

use std::sync::Arc;

use crate::backends::{self, DatabaseExecutor, SqlDialect};
use crate::config::MapperConfig;
use crate::error::{ModelError, ModelResult};
use crate::model::{Model, ModelDefinition};
use crate::schema::synthesizer::check_supported;
use crate::schema::{synthesize, Registry, RegistryBuilder, SchemaPlan};
use crate::table::{Table, TableHandle};
use crate::validation::{DescriptorValidator, RecordValidator};

/// State shared by every handle of one database
pub(crate) struct MapperContext {
    pub(crate) registry: Registry,
    pub(crate) executor: Arc<dyn DatabaseExecutor>,
    pub(crate) validator: Arc<dyn RecordValidator>,
    pub(crate) config: MapperConfig,
}

/// Registration phase of a [`Database`]
pub struct DatabaseBuilder {
    executor: Arc<dyn DatabaseExecutor>,
    validator: Arc<dyn RecordValidator>,
    config: MapperConfig,
    registry: RegistryBuilder,
}

impl DatabaseBuilder {
    /// Start from an existing execution engine
    pub fn new(executor: Arc<dyn DatabaseExecutor>) -> Self {
        Self {
            executor,
            validator: Arc::new(DescriptorValidator),
            config: MapperConfig::default(),
            registry: RegistryBuilder::new(),
        }
    }

    /// Open one of the bundled engines from `config`
    pub async fn connect(config: MapperConfig) -> ModelResult<Self> {
        let executor = backends::connect(&config).await?;
        Ok(Self::new(executor).config(config))
    }

    pub fn config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default record validator
    pub fn validator<V: RecordValidator + 'static>(mut self, validator: V) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Register the table backing `M`
    pub fn register<M: Model>(mut self) -> ModelResult<Self> {
        self.registry.register::<M>()?;
        Ok(self)
    }

    /// Register a table without a Rust model type
    pub fn register_definition(mut self, definition: &ModelDefinition) -> ModelResult<Self> {
        self.registry.register_definition(definition)?;
        Ok(self)
    }

    /// Resolve relationships, create the schema and freeze the registry
    pub async fn initialize(self) -> ModelResult<Database> {
        self.config.validate()?;

        let dialect = self.executor.dialect();
        if let Some(configured) = self.config.dialect {
            if configured != dialect {
                return Err(ModelError::Configuration(format!(
                    "Configured dialect {} does not match the execution engine ({})",
                    configured, dialect
                )));
            }
        }

        let registry = self.registry.build()?;
        check_supported(&registry, dialect)?;
        let plan = synthesize(&registry, dialect)?;

        if self.config.create_tables {
            for statement in plan.all_statements() {
                tracing::debug!("{}", statement);
                self.executor.execute_ddl(statement).await?;
            }
        }

        tracing::info!(
            "Initialized {} tables on {} ({} deferred constraints)",
            registry.len(),
            dialect,
            plan.deferred_constraints.len()
        );

        Ok(Database {
            context: Arc::new(MapperContext {
                registry,
                executor: self.executor,
                validator: self.validator,
                config: self.config,
            }),
        })
    }
}

/// Initialized mapping context
#[derive(Clone)]
pub struct Database {
    context: Arc<MapperContext>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("dialect", &self.dialect())
            .field("tables", &self.context.registry.len())
            .finish()
    }
}

impl Database {
    pub fn builder(executor: Arc<dyn DatabaseExecutor>) -> DatabaseBuilder {
        DatabaseBuilder::new(executor)
    }

    /// Typed handle for a registered model
    pub fn table<M: Model>(&self) -> ModelResult<Table<M>> {
        let descriptor = self.context.registry.get_model::<M>().ok_or_else(|| {
            ModelError::Configuration(format!(
                "Model {} is not registered",
                std::any::type_name::<M>()
            ))
        })?;
        Ok(Table::new(TableHandle::new(
            Arc::clone(descriptor),
            Arc::clone(&self.context),
        )))
    }

    /// Untyped handle by table name
    pub fn table_by_name(&self, table_name: &str) -> ModelResult<TableHandle> {
        let descriptor = self.context.registry.require(table_name)?;
        Ok(TableHandle::new(
            Arc::clone(descriptor),
            Arc::clone(&self.context),
        ))
    }

    pub fn registry(&self) -> &Registry {
        &self.context.registry
    }

    pub fn dialect(&self) -> SqlDialect {
        self.context.executor.dialect()
    }

    pub fn config(&self) -> &MapperConfig {
        &self.context.config
    }

    /// The DDL this database was (or would be) created with
    pub fn schema(&self) -> ModelResult<SchemaPlan> {
        synthesize(&self.context.registry, self.dialect())
    }
}
