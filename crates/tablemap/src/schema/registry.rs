//! Table registry
//!
//! Registration happens on a mutable [`RegistryBuilder`]. [`RegistryBuilder::build`]
//! resolves relationships and freezes everything into a [`Registry`], which
//! is never mutated again and is shared behind `Arc` without locking.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use super::descriptor::{extract, TableDescriptor};
use super::resolver::{resolve, PendingTable};
use crate::error::{ModelError, ModelResult};
use crate::model::{Model, ModelDefinition};

/// Mutable registration phase
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    pending: Vec<PendingTable>,
    type_names: HashMap<TypeId, &'static str>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the table backing `M`
    pub fn register<M: Model>(&mut self) -> ModelResult<()> {
        let id = TypeId::of::<M>();
        if let Some(existing) = self.type_names.get(&id) {
            return Err(ModelError::Configuration(format!(
                "Model {} is already registered",
                existing
            )));
        }
        self.push(Some(id), &M::definition())?;
        self.type_names.insert(id, type_name::<M>());
        Ok(())
    }

    /// Register a table that has no Rust model type
    pub fn register_definition(&mut self, definition: &ModelDefinition) -> ModelResult<()> {
        self.push(None, definition)
    }

    fn push(&mut self, model: Option<TypeId>, definition: &ModelDefinition) -> ModelResult<()> {
        let table = extract(definition)?;
        if self.is_registered(&table.table_name) {
            return Err(ModelError::Configuration(format!(
                "Table '{}' is already registered",
                table.table_name
            )));
        }
        tracing::debug!("Registered table '{}'", table.table_name);
        self.pending.push(PendingTable { model, table });
        Ok(())
    }

    pub fn is_registered(&self, table_name: &str) -> bool {
        self.pending.iter().any(|p| p.table.table_name == table_name)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Resolve relationships and freeze the registry
    pub fn build(self) -> ModelResult<Registry> {
        let descriptors = resolve(&self.pending)?;

        let mut by_table = HashMap::with_capacity(descriptors.len());
        let mut by_type = HashMap::new();
        for (index, (descriptor, pending)) in descriptors.iter().zip(&self.pending).enumerate() {
            by_table.insert(descriptor.table_name.clone(), index);
            if let Some(id) = pending.model {
                by_type.insert(id, index);
            }
        }

        Ok(Registry {
            tables: descriptors.into_iter().map(Arc::new).collect(),
            by_table,
            by_type,
        })
    }
}

/// Frozen model identity -> table descriptor map
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tables: Vec<Arc<TableDescriptor>>,
    by_table: HashMap<String, usize>,
    by_type: HashMap<TypeId, usize>,
}

impl Registry {
    /// Descriptor by table name
    pub fn get(&self, table_name: &str) -> Option<&Arc<TableDescriptor>> {
        self.by_table.get(table_name).map(|&i| &self.tables[i])
    }

    /// Descriptor registered for `M`
    pub fn get_model<M: Model>(&self) -> Option<&Arc<TableDescriptor>> {
        self.by_type.get(&TypeId::of::<M>()).map(|&i| &self.tables[i])
    }

    /// Descriptor by table name, failing for unknown tables
    pub fn require(&self, table_name: &str) -> ModelResult<&Arc<TableDescriptor>> {
        self.get(table_name).ok_or_else(|| {
            ModelError::Configuration(format!("Table '{}' is not registered", table_name))
        })
    }

    /// Descriptors in registration order
    pub fn tables(&self) -> impl Iterator<Item = &Arc<TableDescriptor>> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
