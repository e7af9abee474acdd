//! Query Builder WHERE clause operations

use super::builder::QueryBuilder;
use super::types::*;
use crate::backends::DatabaseValue;

impl QueryBuilder {
    /// Add WHERE condition with equality; a NULL value compiles to `IS NULL`
    pub fn where_eq<T: Into<DatabaseValue>>(mut self, column: ColumnRef, value: T) -> Self {
        let value = value.into();
        if value.is_null() {
            return self.where_null(column);
        }
        self.where_conditions.push(WhereCondition {
            column,
            operator: QueryOperator::Equal,
            value: Some(value),
            values: Vec::new(),
        });
        self
    }

    /// Add WHERE condition with IS NULL
    pub fn where_null(mut self, column: ColumnRef) -> Self {
        self.where_conditions.push(WhereCondition {
            column,
            operator: QueryOperator::IsNull,
            value: None,
            values: Vec::new(),
        });
        self
    }

    /// Add WHERE condition with IN; callers pass non-null values
    pub fn where_in(mut self, column: ColumnRef, values: Vec<DatabaseValue>) -> Self {
        self.where_conditions.push(WhereCondition {
            column,
            operator: QueryOperator::In,
            value: None,
            values,
        });
        self
    }
}
