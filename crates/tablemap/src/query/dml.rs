//! Query Builder DML operations (INSERT, UPDATE, DELETE)

use super::builder::QueryBuilder;
use super::types::*;
use super::upsert::UpsertBuilder;
use crate::backends::DatabaseValue;

impl QueryBuilder {
    /// Start an INSERT query
    pub fn insert_into(mut self, table: &str) -> Self {
        self.query_type = QueryType::Insert;
        self.table = Some(table.to_string());
        self
    }

    /// Start an UPDATE query
    pub fn update(mut self, table: &str) -> Self {
        self.query_type = QueryType::Update;
        self.table = Some(table.to_string());
        self
    }

    /// Start a DELETE query
    pub fn delete_from(mut self, table: &str) -> Self {
        self.query_type = QueryType::Delete;
        self.table = Some(table.to_string());
        self
    }

    /// Set a column value (for INSERT/UPDATE)
    pub fn set<T: Into<DatabaseValue>>(mut self, column: &str, value: T) -> Self {
        self.set_clauses.push(SetClause {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    /// Upsert operation (INSERT ... ON CONFLICT UPDATE)
    pub fn upsert(mut self, table: &str, conflict_column: &str) -> UpsertBuilder {
        self.query_type = QueryType::Insert;
        self.table = Some(table.to_string());

        UpsertBuilder {
            query_builder: self,
            conflict_column: conflict_column.to_string(),
            update_columns: Vec::new(),
        }
    }
}
