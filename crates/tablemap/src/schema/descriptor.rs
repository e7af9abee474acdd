//! Table descriptors and the model metadata extractor
//!
//! [`extract`] validates a [`ModelDefinition`] and produces an
//! [`ExtractedTable`]: a table descriptor whose relationship fields are still
//! [`RelationPlaceholder`]s. The resolver later turns those into foreign-key
//! columns and the result is frozen as a [`TableDescriptor`].

use std::collections::HashSet;
use serde::Serialize;

use crate::error::{ModelError, ModelResult};
use crate::model::{DeclaredType, FieldType, ModelDefinition, ModelRef};

/// Foreign-key side of a relationship column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationDescriptor {
    /// Table the column references
    pub target_table: String,
    /// Primary-key column of the referenced table
    pub target_column: String,
    /// Name of the reverse relationship recorded on the referenced table
    pub reverse_name: String,
}

/// One stored column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub max_length: Option<u32>,
    pub relation: Option<RelationDescriptor>,
}

impl ColumnDescriptor {
    pub fn is_relation(&self) -> bool {
        self.relation.is_some()
    }
}

/// Reverse-navigable relationship: rows of `owner_table` whose
/// `owner_column` points at this table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackReference {
    pub name: String,
    pub owner_table: String,
    pub owner_column: String,
    /// Explicitly named reverse relationships are hydrated as lists
    pub hydrated: bool,
}

/// Finalized description of one mapped table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDescriptor {
    pub table_name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub primary_key: String,
    pub indexes: Vec<String>,
    pub unique: Vec<String>,
    pub unique_together: Vec<Vec<String>>,
    pub back_references: Vec<BackReference>,
}

impl TableDescriptor {
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The key column; always the first declared column
    pub fn primary_key_column(&self) -> &ColumnDescriptor {
        &self.columns[0]
    }

    pub fn non_key_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().skip(1)
    }

    pub fn relation_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| c.is_relation())
    }

    pub fn back_reference(&self, name: &str) -> Option<&BackReference> {
        self.back_references.iter().find(|b| b.name == name)
    }

    /// Reverse relationships filled in when this table is hydrated with depth
    pub fn hydrated_back_references(&self) -> impl Iterator<Item = &BackReference> {
        self.back_references.iter().filter(|b| b.hydrated)
    }
}

/// Relationship field awaiting resolution
#[derive(Debug, Clone, PartialEq)]
pub struct RelationPlaceholder {
    pub name: String,
    pub target: ModelRef,
    pub nullable: bool,
    pub reverse_name: Option<String>,
}

/// A column slot of an extracted table
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSlot {
    Resolved(ColumnDescriptor),
    Unresolved(RelationPlaceholder),
}

impl ColumnSlot {
    pub fn name(&self) -> &str {
        match self {
            ColumnSlot::Resolved(c) => &c.name,
            ColumnSlot::Unresolved(p) => &p.name,
        }
    }
}

/// Output of the metadata extractor
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedTable {
    pub table_name: String,
    pub columns: Vec<ColumnSlot>,
    pub primary_key: String,
    pub indexes: Vec<String>,
    pub unique: Vec<String>,
    pub unique_together: Vec<Vec<String>>,
}

impl ExtractedTable {
    pub fn placeholders(&self) -> impl Iterator<Item = &RelationPlaceholder> {
        self.columns.iter().filter_map(|slot| match slot {
            ColumnSlot::Unresolved(p) => Some(p),
            ColumnSlot::Resolved(_) => None,
        })
    }
}

/// Turn a model definition into a table descriptor with unresolved
/// relationship placeholders
pub fn extract(definition: &ModelDefinition) -> ModelResult<ExtractedTable> {
    let table = definition.table_name.trim();
    if table.is_empty() {
        return Err(ModelError::Configuration(
            "Model table name must not be empty".to_string(),
        ));
    }

    if definition.fields.is_empty() {
        return Err(ModelError::Configuration(format!(
            "Model '{}' declares no fields",
            table
        )));
    }

    let mut seen = HashSet::new();
    for field in &definition.fields {
        if field.name.is_empty() {
            return Err(ModelError::Configuration(format!(
                "Model '{}' declares a field with an empty name",
                table
            )));
        }
        if !seen.insert(field.name.as_str()) {
            return Err(ModelError::Configuration(format!(
                "Model '{}' declares field '{}' more than once",
                table, field.name
            )));
        }
    }

    let primary_key = definition.primary_key.as_deref().ok_or_else(|| {
        ModelError::Configuration(format!("Model '{}' has no primary key field", table))
    })?;

    let pk_field = definition
        .fields
        .iter()
        .find(|f| f.name == primary_key)
        .ok_or_else(|| {
            ModelError::Configuration(format!(
                "Primary key '{}' is not a field of model '{}'",
                primary_key, table
            ))
        })?;

    if definition.fields[0].name != primary_key {
        return Err(ModelError::Configuration(format!(
            "Primary key '{}' of model '{}' must be the first declared field",
            primary_key, table
        )));
    }

    if pk_field.nullable {
        return Err(ModelError::Configuration(format!(
            "Primary key '{}' of model '{}' cannot be nullable",
            primary_key, table
        )));
    }

    if matches!(pk_field.declared, DeclaredType::Reference(_)) {
        return Err(ModelError::Configuration(format!(
            "Primary key '{}' of model '{}' cannot be a relationship",
            primary_key, table
        )));
    }

    let check_declared = |kind: &str, name: &str| -> ModelResult<()> {
        if seen.contains(name) {
            Ok(())
        } else {
            Err(ModelError::Configuration(format!(
                "{} field '{}' does not exist on model '{}'",
                kind, name, table
            )))
        }
    };

    for name in &definition.indexes {
        check_declared("Indexed", name)?;
    }
    for name in &definition.unique {
        check_declared("Unique", name)?;
    }
    for group in &definition.unique_together {
        if group.is_empty() {
            return Err(ModelError::Configuration(format!(
                "Model '{}' declares an empty unique-together group",
                table
            )));
        }
        for name in group {
            check_declared("Unique-together", name)?;
        }
    }

    for (field, _) in &definition.back_references {
        check_declared("Back-reference", field)?;
        let declared = definition.fields.iter().find(|f| &f.name == field);
        if !matches!(declared.map(|f| &f.declared), Some(DeclaredType::Reference(_))) {
            return Err(ModelError::Configuration(format!(
                "Back-reference field '{}' of model '{}' is not a relationship",
                field, table
            )));
        }
    }

    let columns = definition
        .fields
        .iter()
        .map(|field| match &field.declared {
            DeclaredType::Scalar(field_type) => ColumnSlot::Resolved(ColumnDescriptor {
                name: field.name.clone(),
                field_type: *field_type,
                nullable: field.nullable,
                max_length: field.max_length,
                relation: None,
            }),
            DeclaredType::Reference(target) => ColumnSlot::Unresolved(RelationPlaceholder {
                name: field.name.clone(),
                target: target.clone(),
                nullable: field.nullable,
                reverse_name: definition
                    .back_references
                    .iter()
                    .rev()
                    .find(|(name, _)| name == &field.name)
                    .map(|(_, reverse)| reverse.clone())
                    .or_else(|| field.back_reference.clone()),
            }),
        })
        .collect();

    Ok(ExtractedTable {
        table_name: table.to_string(),
        columns,
        primary_key: primary_key.to_string(),
        indexes: dedup(&definition.indexes),
        unique: dedup(&definition.unique),
        unique_together: definition.unique_together.clone(),
    })
}

fn dedup(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .filter(|n| seen.insert(n.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldType;

    fn coffee() -> ModelDefinition {
        ModelDefinition::new("coffee")
            .field("id", FieldType::Integer)
            .optional("sweetener", FieldType::Text)
            .field("sweetener_count", FieldType::Integer)
            .reference_table("flavor", "flavor", false)
            .primary_key("id")
            .index("sweetener")
    }

    #[test]
    fn test_extract_marks_relationship_placeholders() {
        let table = extract(&coffee()).unwrap();

        assert_eq!(table.table_name, "coffee");
        assert_eq!(table.primary_key, "id");
        assert_eq!(table.indexes, vec!["sweetener"]);
        assert_eq!(table.columns.len(), 4);

        let placeholders: Vec<_> = table.placeholders().collect();
        assert_eq!(placeholders.len(), 1);
        assert_eq!(placeholders[0].name, "flavor");
        assert_eq!(placeholders[0].target, ModelRef::Table("flavor".into()));
        assert!(!placeholders[0].nullable);
    }

    #[test]
    fn test_primary_key_must_exist_and_come_first() {
        let missing = coffee().primary_key("uid");
        assert!(matches!(extract(&missing), Err(ModelError::Configuration(_))));

        let not_first = coffee().primary_key("sweetener_count");
        let err = extract(&not_first).unwrap_err();
        assert!(err.to_string().contains("first declared field"));

        let mut undeclared = coffee();
        undeclared.primary_key = None;
        assert!(extract(&undeclared).is_err());
    }

    #[test]
    fn test_unknown_index_and_duplicate_fields_rejected() {
        let bad_index = coffee().index("colour");
        let err = extract(&bad_index).unwrap_err();
        assert!(err.to_string().contains("colour"));

        let bad_unique = coffee().unique_together(&["sweetener", "nope"]);
        assert!(extract(&bad_unique).is_err());

        let dup = coffee().field("sweetener", FieldType::Text);
        assert!(extract(&dup).is_err());

        let empty = ModelDefinition::new("empty").primary_key("id");
        assert!(extract(&empty).is_err());

        let nullable_pk = ModelDefinition::new("t")
            .optional("id", FieldType::Integer)
            .primary_key("id");
        assert!(extract(&nullable_pk).is_err());
    }

    #[test]
    fn test_back_reference_must_name_a_relationship() {
        let named = extract(&coffee().back_reference("flavor", "coffees")).unwrap();
        let placeholder = named.placeholders().next().unwrap();
        assert_eq!(placeholder.reverse_name.as_deref(), Some("coffees"));

        let unknown = coffee().back_reference("flavour", "coffees");
        let err = extract(&unknown).unwrap_err();
        assert!(matches!(err, ModelError::Configuration(ref m) if m.contains("flavour")));

        let scalar = coffee().back_reference("sweetener", "coffees");
        let err = extract(&scalar).unwrap_err();
        assert!(matches!(
            err,
            ModelError::Configuration(ref m) if m.contains("not a relationship")
        ));
    }
}
