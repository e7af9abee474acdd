//! Relationship resolver
//!
//! Runs once over every registered table. Each relationship placeholder
//! becomes a foreign-key column typed as the referenced table's primary key,
//! and a reverse relationship entry is recorded on the referenced table.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};

use super::descriptor::{
    BackReference, ColumnDescriptor, ColumnSlot, ExtractedTable, RelationDescriptor,
    TableDescriptor,
};
use crate::error::{ModelError, ModelResult};
use crate::model::ModelRef;

/// A registered table together with the Rust type it was registered for
#[derive(Debug, Clone)]
pub struct PendingTable {
    pub model: Option<TypeId>,
    pub table: ExtractedTable,
}

/// Resolve all placeholders, returning descriptors in registration order
pub fn resolve(pending: &[PendingTable]) -> ModelResult<Vec<TableDescriptor>> {
    let by_table: HashMap<&str, usize> = pending
        .iter()
        .enumerate()
        .map(|(i, p)| (p.table.table_name.as_str(), i))
        .collect();
    let by_type: HashMap<TypeId, usize> = pending
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.model.map(|id| (id, i)))
        .collect();

    let mut resolved: Vec<TableDescriptor> = Vec::with_capacity(pending.len());
    let mut reverse: Vec<Vec<BackReference>> = vec![Vec::new(); pending.len()];

    for entry in pending {
        let owner = &entry.table;
        let mut columns = Vec::with_capacity(owner.columns.len());

        for slot in &owner.columns {
            let placeholder = match slot {
                ColumnSlot::Resolved(column) => {
                    columns.push(column.clone());
                    continue;
                }
                ColumnSlot::Unresolved(placeholder) => placeholder,
            };

            let target_index = match &placeholder.target {
                ModelRef::Type { id, .. } => by_type.get(id).copied(),
                ModelRef::Table(name) => by_table.get(name.as_str()).copied(),
            }
            .ok_or_else(|| {
                ModelError::Configuration(format!(
                    "Field '{}.{}' references {}, which is not registered",
                    owner.table_name, placeholder.name, placeholder.target
                ))
            })?;

            let target = &pending[target_index].table;
            let target_pk = primary_key_of(target)?;

            let reverse_name = placeholder
                .reverse_name
                .clone()
                .unwrap_or_else(|| format!("{}_by_{}", owner.table_name, placeholder.name));

            tracing::debug!(
                "Resolved {}.{} -> {}.{} (reverse '{}')",
                owner.table_name,
                placeholder.name,
                target.table_name,
                target_pk.name,
                reverse_name
            );

            columns.push(ColumnDescriptor {
                name: placeholder.name.clone(),
                field_type: target_pk.field_type,
                nullable: placeholder.nullable,
                max_length: target_pk.max_length,
                relation: Some(RelationDescriptor {
                    target_table: target.table_name.clone(),
                    target_column: target_pk.name.clone(),
                    reverse_name: reverse_name.clone(),
                }),
            });

            reverse[target_index].push(BackReference {
                name: reverse_name,
                owner_table: owner.table_name.clone(),
                owner_column: placeholder.name.clone(),
                hydrated: placeholder.reverse_name.is_some(),
            });
        }

        resolved.push(TableDescriptor {
            table_name: owner.table_name.clone(),
            columns,
            primary_key: owner.primary_key.clone(),
            indexes: owner.indexes.clone(),
            unique: owner.unique.clone(),
            unique_together: owner.unique_together.clone(),
            back_references: Vec::new(),
        });
    }

    for (descriptor, back_references) in resolved.iter_mut().zip(reverse) {
        let mut names = HashSet::new();
        for back in &back_references {
            if descriptor.column(&back.name).is_some() {
                return Err(ModelError::Configuration(format!(
                    "Reverse relationship '{}' from '{}.{}' collides with column '{}.{}'",
                    back.name, back.owner_table, back.owner_column, descriptor.table_name, back.name
                )));
            }
            if !names.insert(back.name.clone()) {
                return Err(ModelError::Configuration(format!(
                    "Table '{}' has two reverse relationships named '{}'",
                    descriptor.table_name, back.name
                )));
            }
        }
        descriptor.back_references = back_references;
    }

    Ok(resolved)
}

fn primary_key_of(table: &ExtractedTable) -> ModelResult<&ColumnDescriptor> {
    match table.columns.first() {
        Some(ColumnSlot::Resolved(column)) if column.name == table.primary_key => Ok(column),
        _ => Err(ModelError::Configuration(format!(
            "Table '{}' has no scalar primary key column",
            table.table_name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldType, ModelDefinition};
    use crate::schema::descriptor::extract;

    fn pending(definitions: Vec<ModelDefinition>) -> Vec<PendingTable> {
        definitions
            .iter()
            .map(|d| PendingTable {
                model: None,
                table: extract(d).unwrap(),
            })
            .collect()
    }

    #[test]
    fn test_foreign_key_takes_referenced_key_type() {
        let tables = pending(vec![
            ModelDefinition::new("flavor")
                .field("id", FieldType::Uuid)
                .text("name", 64)
                .primary_key("id"),
            ModelDefinition::new("coffee")
                .field("id", FieldType::Integer)
                .reference_table("flavor", "flavor", true)
                .primary_key("id"),
        ]);

        let resolved = resolve(&tables).unwrap();
        let flavor_column = resolved[1].column("flavor").unwrap();

        assert_eq!(flavor_column.field_type, FieldType::Uuid);
        assert!(flavor_column.nullable);
        let relation = flavor_column.relation.as_ref().unwrap();
        assert_eq!(relation.target_table, "flavor");
        assert_eq!(relation.target_column, "id");
        assert_eq!(relation.reverse_name, "coffee_by_flavor");

        let back = resolved[0].back_reference("coffee_by_flavor").unwrap();
        assert_eq!(back.owner_table, "coffee");
        assert_eq!(back.owner_column, "flavor");
        assert!(!back.hydrated);
        assert_eq!(resolved[0].hydrated_back_references().count(), 0);
    }

    #[test]
    fn test_self_and_mutual_references_resolve() {
        let tables = pending(vec![
            ModelDefinition::new("node")
                .field("id", FieldType::Integer)
                .reference_table("parent", "node", true)
                .reference_table("owner", "person", true)
                .primary_key("id"),
            ModelDefinition::new("person")
                .field("id", FieldType::Integer)
                .reference_table("favourite", "node", true)
                .primary_key("id"),
        ]);

        let resolved = resolve(&tables).unwrap();
        assert_eq!(resolved[0].relation_columns().count(), 2);
        assert_eq!(resolved[0].back_references.len(), 2);
        assert_eq!(resolved[1].back_references.len(), 1);
    }

    #[test]
    fn test_unregistered_target_and_name_conflicts() {
        let tables = pending(vec![ModelDefinition::new("coffee")
            .field("id", FieldType::Integer)
            .reference_table("flavor", "flavor", false)
            .primary_key("id")]);
        let err = resolve(&tables).unwrap_err();
        assert!(err.to_string().contains("not registered"));

        let tables = pending(vec![
            ModelDefinition::new("flavor")
                .field("id", FieldType::Integer)
                .field("coffees", FieldType::Integer)
                .primary_key("id"),
            ModelDefinition::new("coffee")
                .field("id", FieldType::Integer)
                .reference_table("flavor", "flavor", false)
                .back_reference("flavor", "coffees")
                .primary_key("id"),
        ]);
        assert!(resolve(&tables).is_err());

        let tables = pending(vec![
            ModelDefinition::new("flavor").field("id", FieldType::Integer).primary_key("id"),
            ModelDefinition::new("coffee")
                .field("id", FieldType::Integer)
                .reference_table("main", "flavor", false)
                .reference_table("extra", "flavor", true)
                .back_reference("main", "coffees")
                .back_reference("extra", "coffees")
                .primary_key("id"),
        ]);
        let err = resolve(&tables).unwrap_err();
        assert!(err.to_string().contains("two reverse relationships"));
    }
}
