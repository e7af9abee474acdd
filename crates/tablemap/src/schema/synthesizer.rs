//! Schema Synthesizer - CREATE TABLE statements for registered tables
//!
//! Tables are emitted in dependency order: a depth-first topological sort over
//! relationship edges, visiting tables in registration order. An edge that
//! points back into a table still on the DFS stack closes a cycle; its column
//! is created without an inline `REFERENCES` clause and the constraint is
//! attached afterwards with `ALTER TABLE`. Self-references stay inline.
//! SQLite cannot add constraints to an existing table but resolves foreign
//! keys lazily, so on SQLite cycle edges also stay inline.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::descriptor::{ColumnDescriptor, TableDescriptor};
use super::registry::Registry;
use crate::backends::SqlDialect;
use crate::error::{ModelError, ModelResult};
use crate::model::FieldType;

/// DDL for a whole registry, in execution order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaPlan {
    /// Table names in creation order
    pub table_order: Vec<String>,
    /// CREATE TABLE and CREATE INDEX statements
    pub statements: Vec<String>,
    /// Deferred foreign-key constraints, run after every table exists
    pub deferred_constraints: Vec<String>,
}

impl SchemaPlan {
    /// Every statement in execution order
    pub fn all_statements(&self) -> impl Iterator<Item = &String> {
        self.statements.iter().chain(self.deferred_constraints.iter())
    }
}

#[derive(Clone, Copy, PartialEq)]
enum VisitState {
    Visiting,
    Done,
}

/// Order tables so referenced tables come first
///
/// Returns the order plus the `(table, column)` edges that close a cycle.
pub fn creation_order(
    registry: &Registry,
) -> ModelResult<(Vec<Arc<TableDescriptor>>, HashSet<(String, String)>)> {
    let mut state: HashMap<String, VisitState> = HashMap::new();
    let mut order = Vec::with_capacity(registry.len());
    let mut deferred = HashSet::new();

    for table in registry.tables() {
        if !state.contains_key(&table.table_name) {
            visit(registry, table, &mut state, &mut order, &mut deferred)?;
        }
    }

    Ok((order, deferred))
}

fn visit(
    registry: &Registry,
    table: &Arc<TableDescriptor>,
    state: &mut HashMap<String, VisitState>,
    order: &mut Vec<Arc<TableDescriptor>>,
    deferred: &mut HashSet<(String, String)>,
) -> ModelResult<()> {
    state.insert(table.table_name.clone(), VisitState::Visiting);

    for column in table.relation_columns() {
        let Some(relation) = &column.relation else {
            continue;
        };
        if relation.target_table == table.table_name {
            continue;
        }
        match state.get(&relation.target_table) {
            Some(VisitState::Visiting) => {
                deferred.insert((table.table_name.clone(), column.name.clone()));
            }
            Some(VisitState::Done) => {}
            None => {
                let target = registry.require(&relation.target_table)?;
                visit(registry, target, state, order, deferred)?;
            }
        }
    }

    state.insert(table.table_name.clone(), VisitState::Done);
    order.push(Arc::clone(table));
    Ok(())
}

/// Produce the DDL for every registered table
pub fn synthesize(registry: &Registry, dialect: SqlDialect) -> ModelResult<SchemaPlan> {
    let (order, cycle_edges) = creation_order(registry)?;
    let defer_cycles = dialect.supports_add_foreign_key();

    let mut plan = SchemaPlan::default();

    for table in &order {
        let mut builder = TableBuilder::new(&table.table_name, dialect);

        for column in &table.columns {
            let keyed = column.name == table.primary_key
                || column.is_relation()
                || table.unique.contains(&column.name)
                || table.indexes.contains(&column.name)
                || table.unique_together.iter().any(|g| g.contains(&column.name));
            let is_cycle_edge =
                cycle_edges.contains(&(table.table_name.clone(), column.name.clone()));

            builder.column(column, keyed, table.unique.contains(&column.name));

            if let Some(relation) = &column.relation {
                if is_cycle_edge && defer_cycles {
                    plan.deferred_constraints.push(add_foreign_key_sql(
                        dialect,
                        &table.table_name,
                        &column.name,
                        &relation.target_table,
                        &relation.target_column,
                    ));
                } else {
                    builder.foreign_key(
                        &column.name,
                        &relation.target_table,
                        &relation.target_column,
                    );
                }
            }
        }

        builder.primary_key(&table.primary_key);
        for group in &table.unique_together {
            builder.unique(group);
        }

        plan.statements.push(builder.to_sql());

        for index in &table.indexes {
            plan.statements.push(create_index_sql(dialect, &table.table_name, index));
        }

        plan.table_order.push(table.table_name.clone());
    }

    tracing::debug!(
        "Synthesized schema for {} tables ({} deferred constraints)",
        plan.table_order.len(),
        plan.deferred_constraints.len()
    );

    Ok(plan)
}

/// Column type for a semantic type in `dialect`
///
/// `keyed` columns take part in keys or indexes; MySQL cannot index
/// unbounded TEXT, so they get a bounded VARCHAR there.
pub fn column_type(
    field_type: FieldType,
    max_length: Option<u32>,
    keyed: bool,
    dialect: SqlDialect,
) -> String {
    match (field_type, dialect) {
        (FieldType::Text, _) => match max_length {
            Some(len) => format!("VARCHAR({})", len),
            None if keyed && dialect == SqlDialect::MySQL => "VARCHAR(255)".to_string(),
            None => "TEXT".to_string(),
        },
        (FieldType::Integer, SqlDialect::SQLite) => "INTEGER".to_string(),
        (FieldType::Integer, _) => "BIGINT".to_string(),
        (FieldType::Float, SqlDialect::PostgreSQL) => "DOUBLE PRECISION".to_string(),
        (FieldType::Float, SqlDialect::MySQL) => "DOUBLE".to_string(),
        (FieldType::Float, SqlDialect::SQLite) => "REAL".to_string(),
        (FieldType::Boolean, _) => "BOOLEAN".to_string(),
        (FieldType::Uuid, SqlDialect::PostgreSQL) => "UUID".to_string(),
        (FieldType::Uuid, _) => "VARCHAR(36)".to_string(),
        (FieldType::DateTime, SqlDialect::PostgreSQL) => "TIMESTAMPTZ".to_string(),
        (FieldType::DateTime, SqlDialect::MySQL) => "DATETIME(6)".to_string(),
        (FieldType::DateTime, SqlDialect::SQLite) => "TIMESTAMP".to_string(),
        (FieldType::Json, SqlDialect::PostgreSQL) => "JSONB".to_string(),
        (FieldType::Json, SqlDialect::MySQL) => "JSON".to_string(),
        (FieldType::Json, SqlDialect::SQLite) => "TEXT".to_string(),
    }
}

fn create_index_sql(dialect: SqlDialect, table: &str, column: &str) -> String {
    let name = dialect.quote(&format!("idx_{}_{}", table, column));
    let if_not_exists = if dialect.supports_index_if_not_exists() {
        "IF NOT EXISTS "
    } else {
        ""
    };
    format!(
        "CREATE INDEX {}{} ON {} ({})",
        if_not_exists,
        name,
        dialect.quote(table),
        dialect.quote(column)
    )
}

fn add_foreign_key_sql(
    dialect: SqlDialect,
    table: &str,
    column: &str,
    target_table: &str,
    target_column: &str,
) -> String {
    let constraint = format!("fk_{}_{}", table, column);
    let alter = format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        dialect.quote(table),
        dialect.quote(&constraint),
        dialect.quote(column),
        dialect.quote(target_table),
        dialect.quote(target_column)
    );

    match dialect {
        // Re-running initialization must not fail on an existing constraint
        SqlDialect::PostgreSQL => format!(
            "DO $$ BEGIN IF NOT EXISTS (SELECT 1 FROM pg_constraint WHERE conname = '{}') THEN {}; END IF; END $$",
            constraint.replace('\'', "''"),
            alter
        ),
        _ => alter,
    }
}

/// Table builder for CREATE TABLE statements
pub struct TableBuilder {
    table_name: String,
    dialect: SqlDialect,
    columns: Vec<String>,
    constraints: Vec<String>,
}

impl TableBuilder {
    pub fn new(table_name: &str, dialect: SqlDialect) -> Self {
        Self {
            table_name: table_name.to_string(),
            dialect,
            columns: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Add a column
    pub fn column(&mut self, column: &ColumnDescriptor, keyed: bool, unique: bool) -> &mut Self {
        let mut definition = format!(
            "{} {}",
            self.dialect.quote(&column.name),
            column_type(column.field_type, column.max_length, keyed, self.dialect)
        );
        if !column.nullable {
            definition.push_str(" NOT NULL");
        }
        if unique {
            definition.push_str(" UNIQUE");
        }
        self.columns.push(definition);
        self
    }

    /// Add a primary key constraint
    pub fn primary_key(&mut self, column: &str) -> &mut Self {
        self.constraints
            .insert(0, format!("PRIMARY KEY ({})", self.dialect.quote(column)));
        self
    }

    /// Add a foreign key constraint
    pub fn foreign_key(
        &mut self,
        column: &str,
        references_table: &str,
        references_column: &str,
    ) -> &mut Self {
        let name = format!("fk_{}_{}", self.table_name, column);
        self.constraints.push(format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.dialect.quote(&name),
            self.dialect.quote(column),
            self.dialect.quote(references_table),
            self.dialect.quote(references_column)
        ));
        self
    }

    /// Add a named unique constraint over several columns
    pub fn unique(&mut self, columns: &[String]) -> &mut Self {
        let name = format!("uq_{}_{}", self.table_name, columns.join("_"));
        let quoted: Vec<String> = columns.iter().map(|c| self.dialect.quote(c)).collect();
        self.constraints.push(format!(
            "CONSTRAINT {} UNIQUE ({})",
            self.dialect.quote(&name),
            quoted.join(", ")
        ));
        self
    }

    /// Build the CREATE TABLE SQL
    pub fn to_sql(&self) -> String {
        let mut parts = self.columns.clone();
        parts.extend(self.constraints.iter().cloned());

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.dialect.quote(&self.table_name),
            parts.join(",\n    ")
        )
    }
}

/// Fail early when a registry cannot be expressed in `dialect`
pub fn check_supported(registry: &Registry, dialect: SqlDialect) -> ModelResult<()> {
    if dialect == SqlDialect::MySQL {
        for table in registry.tables() {
            if table.primary_key_column().field_type == FieldType::Json {
                return Err(ModelError::Configuration(format!(
                    "Table '{}' uses a JSON primary key, which MySQL cannot index",
                    table.table_name
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelDefinition;
    use crate::schema::registry::RegistryBuilder;

    fn registry(definitions: &[ModelDefinition]) -> Registry {
        let mut builder = RegistryBuilder::new();
        for d in definitions {
            builder.register_definition(d).unwrap();
        }
        builder.build().unwrap()
    }

    fn flavor_and_coffee() -> Registry {
        // coffee registered first to check the dependency ordering
        registry(&[
            ModelDefinition::new("coffee")
                .field("id", FieldType::Integer)
                .optional("sweetener", FieldType::Text)
                .field("sweetener_count", FieldType::Integer)
                .reference_table("flavor", "flavor", false)
                .primary_key("id")
                .index("sweetener"),
            ModelDefinition::new("flavor")
                .field("id", FieldType::Integer)
                .text("name", 64)
                .field("strength", FieldType::Float)
                .primary_key("id")
                .unique("name"),
        ])
    }

    #[test]
    fn test_referenced_tables_created_first() {
        let plan = synthesize(&flavor_and_coffee(), SqlDialect::SQLite).unwrap();

        assert_eq!(plan.table_order, vec!["flavor", "coffee"]);
        assert!(plan.deferred_constraints.is_empty());
        assert_eq!(
            plan.statements[0],
            "CREATE TABLE IF NOT EXISTS \"flavor\" (\n    \"id\" INTEGER NOT NULL,\n    \"name\" VARCHAR(64) NOT NULL UNIQUE,\n    \"strength\" REAL NOT NULL,\n    PRIMARY KEY (\"id\")\n)"
        );
        assert!(plan.statements[1].contains("\"sweetener\" TEXT,"));
        assert!(plan.statements[1].contains(
            "CONSTRAINT \"fk_coffee_flavor\" FOREIGN KEY (\"flavor\") REFERENCES \"flavor\" (\"id\")"
        ));
        assert_eq!(
            plan.statements[2],
            "CREATE INDEX IF NOT EXISTS \"idx_coffee_sweetener\" ON \"coffee\" (\"sweetener\")"
        );
    }

    fn mutual() -> Registry {
        registry(&[
            ModelDefinition::new("person")
                .field("id", FieldType::Integer)
                .reference_table("home", "house", true)
                .reference_table("mentor", "person", true)
                .primary_key("id"),
            ModelDefinition::new("house")
                .field("id", FieldType::Integer)
                .reference_table("owner", "person", true)
                .primary_key("id"),
        ])
    }

    #[test]
    fn test_cycle_edge_deferred_on_postgres() {
        let plan = synthesize(&mutual(), SqlDialect::PostgreSQL).unwrap();

        assert_eq!(plan.table_order, vec!["house", "person"]);
        assert!(!plan.statements[0].contains("REFERENCES"));
        assert!(plan.statements[1].contains("REFERENCES \"house\""));
        // self-reference stays inline
        assert!(plan.statements[1].contains("REFERENCES \"person\""));
        assert_eq!(plan.deferred_constraints.len(), 1);
        assert!(plan.deferred_constraints[0].contains(
            "ALTER TABLE \"house\" ADD CONSTRAINT \"fk_house_owner\" FOREIGN KEY (\"owner\") REFERENCES \"person\" (\"id\")"
        ));
        assert!(plan.statements[1].contains("\"id\" BIGINT NOT NULL"));
    }

    #[test]
    fn test_cycle_edge_stays_inline_on_sqlite() {
        let plan = synthesize(&mutual(), SqlDialect::SQLite).unwrap();
        assert!(plan.deferred_constraints.is_empty());
        assert!(plan.statements[0].contains("REFERENCES \"person\""));
    }

    #[test]
    fn test_unique_together_and_type_mapping() {
        let registry = registry(&[ModelDefinition::new("event")
            .field("id", FieldType::Uuid)
            .field("at", FieldType::DateTime)
            .field("payload", FieldType::Json)
            .field("active", FieldType::Boolean)
            .field("room", FieldType::Text)
            .primary_key("id")
            .unique_together(&["at", "room"])]);

        let pg = synthesize(&registry, SqlDialect::PostgreSQL).unwrap();
        let create = &pg.statements[0];
        assert!(create.contains("\"id\" UUID NOT NULL"));
        assert!(create.contains("\"at\" TIMESTAMPTZ NOT NULL"));
        assert!(create.contains("\"payload\" JSONB NOT NULL"));
        assert!(create.contains("\"active\" BOOLEAN NOT NULL"));
        assert!(create.contains("CONSTRAINT \"uq_event_at_room\" UNIQUE (\"at\", \"room\")"));

        let mysql = synthesize(&registry, SqlDialect::MySQL).unwrap();
        assert!(mysql.statements[0].contains("`room` VARCHAR(255) NOT NULL"));
        assert!(mysql.statements[0].contains("`id` VARCHAR(36) NOT NULL"));
    }
}
