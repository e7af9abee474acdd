//! Table handles
//!
//! [`TableHandle`] is the per-table CRUD facade over untyped [`Record`]s;
//! [`Table<M>`] wraps it for a concrete [`Model`]. Handles are cheap to clone
//! and hold nothing beyond their descriptor and the shared context.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::backends::{DatabaseValue, SqlDialect};
use crate::config::UpsertStrategy;
use crate::database::MapperContext;
use crate::error::{ModelError, ModelResult};
use crate::hydration::{coerce_field, BatchLoader, JoinPlan, RowHydrator};
use crate::model::{Model, Record};
use crate::query::{statements, FindQuery, Page, Statement};
use crate::schema::TableDescriptor;

/// Untyped CRUD handle for one registered table
#[derive(Clone)]
pub struct TableHandle {
    descriptor: Arc<TableDescriptor>,
    context: Arc<MapperContext>,
}

impl std::fmt::Debug for TableHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableHandle")
            .field("table", &self.descriptor.table_name)
            .finish()
    }
}

impl TableHandle {
    pub(crate) fn new(descriptor: Arc<TableDescriptor>, context: Arc<MapperContext>) -> Self {
        Self { descriptor, context }
    }

    pub fn descriptor(&self) -> &TableDescriptor {
        &self.descriptor
    }

    pub fn table_name(&self) -> &str {
        &self.descriptor.table_name
    }

    fn dialect(&self) -> SqlDialect {
        self.context.executor.dialect()
    }

    async fn execute(&self, statement: &Statement) -> ModelResult<u64> {
        tracing::debug!(table = %self.descriptor.table_name, sql = %statement.sql, "execute");
        self.context
            .executor
            .execute(&statement.sql, &statement.params)
            .await
    }

    async fn validated(&self, record: Record) -> ModelResult<Record> {
        self.context
            .validator
            .validate_record(&self.descriptor, record)
            .await
    }

    /// Normalize a caller-supplied key to the primary key's type
    fn key(&self, key: DatabaseValue) -> ModelResult<DatabaseValue> {
        if key.is_null() {
            return Err(ModelError::validation(
                &self.descriptor.primary_key,
                "key must not be null",
            ));
        }
        coerce_field(self.descriptor.primary_key_column(), key)
    }

    fn plan(&self, depth: usize) -> ModelResult<JoinPlan> {
        let max_depth = self.context.config.max_depth;
        if depth > max_depth {
            return Err(ModelError::Configuration(format!(
                "Requested depth {} exceeds the configured maximum of {}",
                depth, max_depth
            )));
        }
        let max_tables = self.dialect().max_join_tables();
        JoinPlan::build_within(&self.context.registry, &self.descriptor, depth, max_tables)
    }

    /// Load what the plan's joins did not reach
    async fn complete(&self, plan: &JoinPlan, records: &mut [Record]) -> ModelResult<()> {
        BatchLoader::new(&self.context.registry, self.context.executor.as_ref())
            .batch_size(self.context.config.batch_size)
            .load(plan, records)
            .await
    }

    /// Insert a record; fails with a constraint error on key collision or
    /// a dangling reference
    pub async fn insert(&self, record: Record) -> ModelResult<u64> {
        let record = self.validated(record).await?;
        let statement = statements::insert(&self.descriptor, self.dialect(), &record)?;
        self.execute(&statement).await
    }

    /// Update every non-key column of the row with the record's key
    pub async fn update(&self, record: Record) -> ModelResult<()> {
        let record = self.validated(record).await?;
        let key = statements::record_key(&self.descriptor, &record)?;

        match statements::update(&self.descriptor, self.dialect(), &record)? {
            Some(statement) => {
                if self.execute(&statement).await? == 0 {
                    return Err(ModelError::not_found(&self.descriptor.table_name, key));
                }
            }
            None => {
                // Nothing to set; only the row's existence matters
                if !self.exists(&key).await? {
                    return Err(ModelError::not_found(&self.descriptor.table_name, key));
                }
            }
        }

        Ok(())
    }

    /// Insert, or update the existing row on a primary-key collision
    pub async fn upsert(&self, record: Record) -> ModelResult<()> {
        let record = self.validated(record).await?;
        let dialect = self.dialect();

        if self.context.config.upsert_strategy == UpsertStrategy::Native
            && dialect.supports_native_upsert()
        {
            let statement = statements::upsert(&self.descriptor, dialect, &record)?;
            self.execute(&statement).await?;
            return Ok(());
        }

        let insert = statements::insert(&self.descriptor, dialect, &record)?;
        let collision = match self.execute(&insert).await {
            Ok(_) => return Ok(()),
            Err(e) if e.is_key_collision() => e,
            Err(e) => return Err(e),
        };

        tracing::debug!(
            "Key collision on '{}', falling back to update",
            self.descriptor.table_name
        );
        // A collision on another unique column leaves no row with this key
        let updated = match statements::update(&self.descriptor, dialect, &record)? {
            Some(update) => self.execute(&update).await? > 0,
            None => {
                let key = statements::record_key(&self.descriptor, &record)?;
                self.exists(&key).await?
            }
        };
        if updated {
            Ok(())
        } else {
            Err(collision)
        }
    }

    /// Delete by key; `true` when a row was removed
    pub async fn delete(&self, key: impl Into<DatabaseValue>) -> ModelResult<bool> {
        let key = self.key(key.into())?;
        let statement = statements::delete(&self.descriptor, self.dialect(), &key);
        Ok(self.execute(&statement).await? > 0)
    }

    async fn exists(&self, key: &DatabaseValue) -> ModelResult<bool> {
        let statement = statements::exists(&self.descriptor, self.dialect(), key);
        let rows = self
            .context
            .executor
            .fetch_all(&statement.sql, &statement.params)
            .await?;
        Ok(!rows.is_empty())
    }

    /// Fetch one row by key, relationships expanded `depth` levels
    pub async fn find_one(
        &self,
        key: impl Into<DatabaseValue>,
        depth: usize,
    ) -> ModelResult<Record> {
        let key = self.key(key.into())?;
        let plan = self.plan(depth)?;
        let statement = statements::find_one(&plan, self.dialect(), &key);

        tracing::debug!(
            table = %self.descriptor.table_name,
            sql = %statement.sql,
            depth,
            "find_one"
        );
        let rows = self
            .context
            .executor
            .fetch_all(&statement.sql, &statement.params)
            .await?;

        let mut record = match rows.first() {
            Some(row) => RowHydrator::new(&plan).hydrate(row)?,
            None => return Err(ModelError::not_found(&self.descriptor.table_name, key)),
        };
        self.complete(&plan, std::slice::from_mut(&mut record)).await?;
        Ok(record)
    }

    /// Fetch a filtered, ordered page of rows
    pub async fn find_many(&self, query: &FindQuery) -> ModelResult<Page<Record>> {
        let plan = self.plan(query.depth)?;
        let statement = statements::find_many(&plan, self.dialect(), query)?;

        tracing::debug!(
            table = %self.descriptor.table_name,
            sql = %statement.sql,
            depth = query.depth,
            "find_many"
        );
        let rows = self
            .context
            .executor
            .fetch_all(&statement.sql, &statement.params)
            .await?;

        let mut data = RowHydrator::new(&plan).hydrate_all(&rows)?;
        self.complete(&plan, &mut data).await?;

        Ok(Page {
            offset: query.offset.unwrap_or(0),
            limit: query.limit,
            data,
        })
    }
}

/// Typed handle for a registered model
pub struct Table<M> {
    handle: TableHandle,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for Table<M> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            _model: PhantomData,
        }
    }
}

impl<M> std::fmt::Debug for Table<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Table").field(&self.handle).finish()
    }
}

impl<M: Model> Table<M> {
    pub(crate) fn new(handle: TableHandle) -> Self {
        Self {
            handle,
            _model: PhantomData,
        }
    }

    /// The untyped handle underneath
    pub fn handle(&self) -> &TableHandle {
        &self.handle
    }

    pub fn descriptor(&self) -> &TableDescriptor {
        self.handle.descriptor()
    }

    pub async fn insert(&self, model: &M) -> ModelResult<u64> {
        self.handle.insert(model.to_record()).await
    }

    pub async fn update(&self, model: &M) -> ModelResult<()> {
        self.handle.update(model.to_record()).await
    }

    pub async fn upsert(&self, model: &M) -> ModelResult<()> {
        self.handle.upsert(model.to_record()).await
    }

    pub async fn delete(&self, key: impl Into<DatabaseValue>) -> ModelResult<bool> {
        self.handle.delete(key).await
    }

    pub async fn find_one(
        &self,
        key: impl Into<DatabaseValue>,
        depth: usize,
    ) -> ModelResult<M> {
        let record = self.handle.find_one(key, depth).await?;
        M::from_record(record)
    }

    pub async fn find_many(&self, query: &FindQuery) -> ModelResult<Page<M>> {
        self.handle.find_many(query).await?.try_map(M::from_record)
    }
}
