//! Statement compilation for one table
//!
//! Every CRUD operation of a table handle compiles to a single
//! [`Statement`] here. Relationship columns accept either a nested record or
//! a bare key; the key is extracted before binding.

use super::builder::QueryBuilder;
use super::find::FindQuery;
use super::types::ColumnRef;
use crate::backends::{DatabaseValue, SqlDialect};
use crate::error::{ModelError, ModelResult};
use crate::hydration::{coerce_field, JoinPlan};
use crate::model::{FieldValue, Record};
use crate::schema::{ColumnDescriptor, TableDescriptor};

/// SQL text plus bind values
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<DatabaseValue>,
}

impl From<(String, Vec<DatabaseValue>)> for Statement {
    fn from((sql, params): (String, Vec<DatabaseValue>)) -> Self {
        Self { sql, params }
    }
}

/// Stored value of `column` for a field value: the value itself, or the
/// referenced record's primary key for a nested record, coerced to the
/// column's type
pub fn column_value(column: &ColumnDescriptor, value: &FieldValue) -> ModelResult<DatabaseValue> {
    match value {
        FieldValue::Value(v) => coerce_field(column, v.clone()),
        FieldValue::Entity(nested) => {
            let relation = column.relation.as_ref().ok_or_else(|| {
                ModelError::validation(&column.name, "nested record given for a scalar column")
            })?;
            match nested.get(&relation.target_column) {
                Some(FieldValue::Value(key)) if !key.is_null() => coerce_field(column, key.clone()),
                _ => Err(ModelError::validation(
                    &column.name,
                    format!(
                        "nested {} record has no '{}' key",
                        relation.target_table, relation.target_column
                    ),
                )),
            }
        }
        FieldValue::List(_) => Err(ModelError::validation(
            &column.name,
            "a list of records cannot be stored in a column",
        )),
    }
}

/// Stored values for every column, in declaration order
pub fn row_values(
    table: &TableDescriptor,
    record: &Record,
) -> ModelResult<Vec<(String, DatabaseValue)>> {
    table
        .columns
        .iter()
        .map(|column| {
            let value = match record.get(&column.name) {
                Some(value) => column_value(column, value)?,
                None if column.nullable => DatabaseValue::Null,
                None => return Err(ModelError::validation(&column.name, "field is missing")),
            };
            Ok((column.name.clone(), value))
        })
        .collect()
}

/// Primary key of a record
pub fn record_key(table: &TableDescriptor, record: &Record) -> ModelResult<DatabaseValue> {
    match record.value(&table.primary_key) {
        Some(key) if !key.is_null() => Ok(key.clone()),
        _ => Err(ModelError::validation(&table.primary_key, "primary key is missing")),
    }
}

fn with_values(mut builder: QueryBuilder, values: &[(String, DatabaseValue)]) -> QueryBuilder {
    for (column, value) in values {
        builder = builder.set(column, value.clone());
    }
    builder
}

pub fn insert(
    table: &TableDescriptor,
    dialect: SqlDialect,
    record: &Record,
) -> ModelResult<Statement> {
    let values = row_values(table, record)?;
    let builder =
        with_values(QueryBuilder::new(dialect), &values).insert_into(&table.table_name);
    Ok(builder.to_sql_with_params().into())
}

/// UPDATE of every non-key column; `None` for a table with only a key
pub fn update(
    table: &TableDescriptor,
    dialect: SqlDialect,
    record: &Record,
) -> ModelResult<Option<Statement>> {
    let values = row_values(table, record)?;
    let (key, rest) = values.split_first().ok_or_else(|| {
        ModelError::Configuration(format!("Table '{}' has no columns", table.table_name))
    })?;
    if rest.is_empty() {
        return Ok(None);
    }

    let builder = with_values(QueryBuilder::new(dialect).update(&table.table_name), rest)
        .where_eq(ColumnRef::new(&key.0), key.1.clone());
    Ok(Some(builder.to_sql_with_params().into()))
}

/// Single-statement insert-or-update on the primary key
pub fn upsert(
    table: &TableDescriptor,
    dialect: SqlDialect,
    record: &Record,
) -> ModelResult<Statement> {
    let values = row_values(table, record)?;
    let mut upsert = with_values(QueryBuilder::new(dialect), &values)
        .upsert(&table.table_name, &table.primary_key);
    for column in table.non_key_columns() {
        upsert = upsert.update_column(&column.name);
    }
    Ok(upsert.to_sql_with_params().into())
}

pub fn delete(table: &TableDescriptor, dialect: SqlDialect, key: &DatabaseValue) -> Statement {
    QueryBuilder::new(dialect)
        .delete_from(&table.table_name)
        .where_eq(ColumnRef::new(&table.primary_key), key.clone())
        .to_sql_with_params()
        .into()
}

/// Existence check for a key
pub fn exists(table: &TableDescriptor, dialect: SqlDialect, key: &DatabaseValue) -> Statement {
    QueryBuilder::new(dialect)
        .select(ColumnRef::new(&table.primary_key))
        .from(&table.table_name, None)
        .where_eq(ColumnRef::new(&table.primary_key), key.clone())
        .to_sql_with_params()
        .into()
}

/// SELECT of one row by key through `plan`
pub fn find_one(plan: &JoinPlan, dialect: SqlDialect, key: &DatabaseValue) -> Statement {
    let root = plan.root();
    plan.apply(QueryBuilder::new(dialect))
        .where_eq(ColumnRef::qualified(&root.alias, &root.table.primary_key), key.clone())
        .to_sql_with_params()
        .into()
}

/// SELECT through `plan` of every row whose `column` is one of `keys`,
/// ordered by the primary key
pub fn find_in(
    plan: &JoinPlan,
    dialect: SqlDialect,
    column: &str,
    keys: Vec<DatabaseValue>,
) -> Statement {
    let root = plan.root();
    plan.apply(QueryBuilder::new(dialect))
        .where_in(ColumnRef::qualified(&root.alias, column), keys)
        .order_by(ColumnRef::qualified(&root.alias, &root.table.primary_key))
        .to_sql_with_params()
        .into()
}

/// SELECT for `find_many`
///
/// Ties in the requested order are broken by the primary key.
pub fn find_many(
    plan: &JoinPlan,
    dialect: SqlDialect,
    query: &FindQuery,
) -> ModelResult<Statement> {
    let root = plan.root();
    let table = &root.table;

    if let Some(limit) = query.limit {
        if limit < 0 {
            return Err(ModelError::Configuration(format!(
                "limit must not be negative, got {}",
                limit
            )));
        }
    }
    if let Some(offset) = query.offset {
        if offset < 0 {
            return Err(ModelError::Configuration(format!(
                "offset must not be negative, got {}",
                offset
            )));
        }
    }

    let mut builder = plan.apply(QueryBuilder::new(dialect));

    for (name, value) in &query.filters {
        let column = table.column(name).ok_or_else(|| {
            ModelError::Configuration(format!(
                "Cannot filter on unknown column '{}.{}'",
                table.table_name, name
            ))
        })?;
        let value = column_value(column, value)?;
        builder = builder.where_eq(ColumnRef::qualified(&root.alias, name), value);
    }

    let mut ordered_by_key = false;
    for (name, direction) in &query.order_by {
        if table.column(name).is_none() {
            return Err(ModelError::Configuration(format!(
                "Cannot order by unknown column '{}.{}'",
                table.table_name, name
            )));
        }
        ordered_by_key |= *name == table.primary_key;
        builder = builder.order_by_direction(ColumnRef::qualified(&root.alias, name), *direction);
    }
    if !ordered_by_key {
        builder = builder.order_by(ColumnRef::qualified(&root.alias, &table.primary_key));
    }

    if let Some(limit) = query.limit {
        builder = builder.limit(limit);
    }
    if let Some(offset) = query.offset {
        builder = builder.offset(offset);
    }

    Ok(builder.to_sql_with_params().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldType, ModelDefinition};
    use crate::schema::{Registry, RegistryBuilder};

    fn registry() -> Registry {
        let mut builder = RegistryBuilder::new();
        builder
            .register_definition(
                &ModelDefinition::new("flavor")
                    .field("id", FieldType::Integer)
                    .text("name", 64)
                    .primary_key("id"),
            )
            .unwrap();
        builder
            .register_definition(
                &ModelDefinition::new("coffee")
                    .field("id", FieldType::Integer)
                    .optional("sweetener", FieldType::Text)
                    .reference_table("flavor", "flavor", false)
                    .primary_key("id"),
            )
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_insert_extracts_nested_key() {
        let registry = registry();
        let coffee = registry.require("coffee").unwrap();
        let record = Record::new()
            .with("id", 1i64)
            .with_entity("flavor", Record::new().with("id", 7i64).with("name", "mocha"));

        let statement = insert(coffee, SqlDialect::PostgreSQL, &record).unwrap();
        assert_eq!(
            statement.sql,
            "INSERT INTO \"coffee\" (\"id\", \"sweetener\", \"flavor\") VALUES ($1, NULL, $2)"
        );
        assert_eq!(statement.params, vec![DatabaseValue::Integer(1), DatabaseValue::Integer(7)]);

        let missing = Record::new().with("id", 1i64);
        assert!(matches!(
            insert(coffee, SqlDialect::PostgreSQL, &missing),
            Err(ModelError::Validation { ref field, .. }) if field == "flavor"
        ));
    }

    #[test]
    fn test_update_and_upsert_skip_the_key() {
        let registry = registry();
        let flavor = registry.require("flavor").unwrap();
        let record = Record::new().with("id", 7i64).with("name", "mocha");

        let statement = update(flavor, SqlDialect::SQLite, &record).unwrap().unwrap();
        assert_eq!(statement.sql, "UPDATE \"flavor\" SET \"name\" = ? WHERE \"id\" = ?");
        assert_eq!(
            statement.params,
            vec![DatabaseValue::String("mocha".into()), DatabaseValue::Integer(7)]
        );

        let statement = upsert(flavor, SqlDialect::SQLite, &record).unwrap();
        assert!(statement
            .sql
            .ends_with("ON CONFLICT (\"id\") DO UPDATE SET \"name\" = excluded.\"name\""));
    }

    #[test]
    fn test_find_many_filters_orders_and_pages() {
        let registry = registry();
        let coffee = registry.require("coffee").unwrap();
        let plan = JoinPlan::build(&registry, coffee, 0).unwrap();

        let query = FindQuery::new()
            .filter("sweetener", DatabaseValue::Null)
            .filter_entity("flavor", Record::new().with("id", 7i64))
            .order_by_desc("sweetener")
            .limit(2)
            .offset(4);
        let statement = find_many(&plan, SqlDialect::SQLite, &query).unwrap();

        assert!(statement.sql.ends_with(
            "WHERE \"t0\".\"sweetener\" IS NULL AND \"t0\".\"flavor\" = ? \
             ORDER BY \"t0\".\"sweetener\" DESC, \"t0\".\"id\" ASC LIMIT 2 OFFSET 4"
        ));
        assert_eq!(statement.params, vec![DatabaseValue::Integer(7)]);
    }

    #[test]
    fn test_filters_are_coerced_to_column_types() {
        let mut builder = RegistryBuilder::new();
        builder
            .register_definition(
                &ModelDefinition::new("event")
                    .field("id", FieldType::Uuid)
                    .field("active", FieldType::Boolean)
                    .reference_table("previous", "event", true)
                    .primary_key("id"),
            )
            .unwrap();
        let registry = builder.build().unwrap();
        let event = registry.require("event").unwrap();
        let plan = JoinPlan::build(&registry, event, 0).unwrap();
        let id = uuid::Uuid::new_v4();

        let query = FindQuery::new()
            .filter("active", "true")
            .filter_entity("previous", Record::new().with("id", id.to_string()));
        let statement = find_many(&plan, SqlDialect::PostgreSQL, &query).unwrap();
        assert_eq!(statement.params, vec![DatabaseValue::Bool(true), DatabaseValue::Uuid(id)]);

        let bad = FindQuery::new().filter("id", "not-a-uuid");
        assert!(matches!(
            find_many(&plan, SqlDialect::PostgreSQL, &bad),
            Err(ModelError::Validation { ref field, .. }) if field == "id"
        ));
    }

    #[test]
    fn test_find_in_selects_by_key_list() {
        let registry = registry();
        let coffee = registry.require("coffee").unwrap();
        let plan = JoinPlan::build(&registry, coffee, 0).unwrap();

        let statement = find_in(
            &plan,
            SqlDialect::PostgreSQL,
            "flavor",
            vec![DatabaseValue::Integer(7), DatabaseValue::Integer(8)],
        );
        assert!(statement.sql.ends_with(
            "FROM \"coffee\" AS \"t0\" WHERE \"t0\".\"flavor\" IN ($1, $2) ORDER BY \"t0\".\"id\" ASC"
        ));
        assert_eq!(statement.params.len(), 2);
    }

    #[test]
    fn test_find_many_rejects_bad_arguments() {
        let registry = registry();
        let coffee = registry.require("coffee").unwrap();
        let plan = JoinPlan::build(&registry, coffee, 0).unwrap();

        let bad = [
            FindQuery::new().limit(-1),
            FindQuery::new().offset(-5),
            FindQuery::new().filter("colour", "red"),
            FindQuery::new().order_by("colour"),
        ];
        for query in &bad {
            assert!(matches!(
                find_many(&plan, SqlDialect::SQLite, query),
                Err(ModelError::Configuration(_))
            ));
        }
    }
}
