//! Follow-up batch loading
//!
//! Fills in what one joined SELECT leaves out: relationships below a
//! truncated [`JoinNode`] and named back references. Keys are collected
//! across every hydrated record first, then fetched with one `IN` query per
//! target table, key column, depth and chunk. Fetched records are loaded
//! the same way before they are attached, one level shallower each time.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;

use super::plan::{JoinNode, JoinPlan};
use super::RowHydrator;
use crate::backends::{DatabaseExecutor, DatabaseValue, SqlDialect};
use crate::error::ModelResult;
use crate::model::{FieldValue, Record};
use crate::query::statements;
use crate::schema::{Registry, TableDescriptor};

/// Boxed so loading can recurse into the records it fetched
pub type LoadFuture<'a> = Pin<Box<dyn Future<Output = ModelResult<()>> + Send + 'a>>;

/// One follow-up query: rows of `table` whose `column` is in a key set,
/// hydrated `depth` levels
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BatchKey {
    table: String,
    column: String,
    depth: usize,
}

/// Distinct keys in first-seen order
#[derive(Debug, Default)]
struct KeySet {
    keys: Vec<DatabaseValue>,
    seen: HashSet<String>,
}

impl KeySet {
    fn add(&mut self, key: &DatabaseValue) {
        if self.seen.insert(key.to_string()) {
            self.keys.push(key.clone());
        }
    }
}

/// Loaded records by the display form of their key column
type Loaded = HashMap<BatchKey, HashMap<String, Vec<Record>>>;

/// Batch loader for relationships a join plan did not reach
pub struct BatchLoader<'a> {
    registry: &'a Registry,
    executor: &'a dyn DatabaseExecutor,
    dialect: SqlDialect,
    batch_size: usize,
}

impl<'a> BatchLoader<'a> {
    pub fn new(registry: &'a Registry, executor: &'a dyn DatabaseExecutor) -> Self {
        Self {
            registry,
            executor,
            dialect: executor.dialect(),
            batch_size: crate::config::DEFAULT_BATCH_SIZE,
        }
    }

    /// Most keys bound in one `IN` list
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Complete `records`, hydrated through `plan`, in place
    pub fn load<'s>(&'s self, plan: &'s JoinPlan, records: &'s mut [Record]) -> LoadFuture<'s> {
        Box::pin(async move {
            let mut batches: HashMap<BatchKey, KeySet> = HashMap::new();
            for record in records.iter() {
                collect(plan.root(), record, &mut batches);
            }
            if batches.is_empty() {
                return Ok(());
            }

            let mut loaded = Loaded::with_capacity(batches.len());
            for (batch, keys) in batches {
                let fetched = self.fetch(&batch, keys.keys).await?;
                loaded.insert(batch, fetched);
            }

            for record in records.iter_mut() {
                fill(plan.root(), record, &loaded);
            }
            Ok(())
        })
    }

    async fn fetch(
        &self,
        batch: &BatchKey,
        keys: Vec<DatabaseValue>,
    ) -> ModelResult<HashMap<String, Vec<Record>>> {
        let table = self.registry.require(&batch.table)?;
        let plan = JoinPlan::build_within(
            self.registry,
            table,
            batch.depth,
            self.dialect.max_join_tables(),
        )?;

        let mut records = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(self.batch_size) {
            let statement = statements::find_in(&plan, self.dialect, &batch.column, chunk.to_vec());
            tracing::debug!(
                table = %batch.table,
                column = %batch.column,
                keys = chunk.len(),
                depth = batch.depth,
                "batch load"
            );
            let rows = self
                .executor
                .fetch_all(&statement.sql, &statement.params)
                .await?;
            records.extend(RowHydrator::new(&plan).hydrate_all(&rows)?);
        }

        self.load(&plan, &mut records).await?;

        let mut grouped: HashMap<String, Vec<Record>> = HashMap::new();
        for record in records {
            if let Some(key) = stored_key(table, &record, &batch.column) {
                grouped.entry(key).or_default().push(record);
            }
        }
        Ok(grouped)
    }
}

/// Key stored in `column`, read through a nested record if it was expanded
fn stored_key(table: &TableDescriptor, record: &Record, column: &str) -> Option<String> {
    match record.get(column)? {
        FieldValue::Value(key) if !key.is_null() => Some(key.to_string()),
        FieldValue::Entity(nested) => {
            let relation = table.column(column)?.relation.as_ref()?;
            nested.value(&relation.target_column).map(ToString::to_string)
        }
        _ => None,
    }
}

fn collect(node: &JoinNode, record: &Record, batches: &mut HashMap<BatchKey, KeySet>) {
    if node.remaining == 0 {
        return;
    }

    if node.is_truncated() {
        for column in node.table.relation_columns() {
            let (Some(relation), Some(key)) = (&column.relation, record.value(&column.name)) else {
                continue;
            };
            if key.is_null() {
                continue;
            }
            let batch = BatchKey {
                table: relation.target_table.clone(),
                column: relation.target_column.clone(),
                depth: node.remaining - 1,
            };
            batches.entry(batch).or_default().add(key);
        }
    } else {
        for (column, child) in &node.children {
            if let Some(nested) = record.entity(column) {
                collect(child, nested, batches);
            }
        }
    }

    if let Some(key) = record.value(&node.table.primary_key) {
        for back in node.table.hydrated_back_references() {
            let batch = BatchKey {
                table: back.owner_table.clone(),
                column: back.owner_column.clone(),
                depth: node.remaining - 1,
            };
            batches.entry(batch).or_default().add(key);
        }
    }
}

fn fill(node: &JoinNode, record: &mut Record, loaded: &Loaded) {
    if node.remaining == 0 {
        return;
    }

    if node.is_truncated() {
        for column in node.table.relation_columns() {
            let Some(relation) = &column.relation else {
                continue;
            };
            let key = match record.value(&column.name) {
                Some(key) if !key.is_null() => key.to_string(),
                _ => continue,
            };
            let batch = BatchKey {
                table: relation.target_table.clone(),
                column: relation.target_column.clone(),
                depth: node.remaining - 1,
            };
            let found = loaded
                .get(&batch)
                .and_then(|records| records.get(&key))
                .and_then(|records| records.first());
            match found {
                Some(nested) => {
                    record.set(&column.name, FieldValue::Entity(Box::new(nested.clone())));
                }
                None => tracing::warn!(
                    "Dangling reference {}.{} = {} at '{}/{}'; keeping the raw key",
                    node.table.table_name,
                    column.name,
                    key,
                    node.path,
                    column.name
                ),
            }
        }
    } else {
        for (column, child) in &node.children {
            if let Some(nested) = record.entity_mut(column) {
                fill(child, nested, loaded);
            }
        }
    }

    let Some(key) = record.value(&node.table.primary_key).map(ToString::to_string) else {
        return;
    };
    for back in node.table.hydrated_back_references() {
        let batch = BatchKey {
            table: back.owner_table.clone(),
            column: back.owner_column.clone(),
            depth: node.remaining - 1,
        };
        let owners = loaded
            .get(&batch)
            .and_then(|records| records.get(&key))
            .cloned()
            .unwrap_or_default();
        record.set(&back.name, FieldValue::List(owners));
    }
}
