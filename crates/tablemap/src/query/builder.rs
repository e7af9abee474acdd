//! Query Builder - Core builder implementation

use super::types::*;
use crate::backends::SqlDialect;

/// Query builder for constructing dialect-specific statements
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    pub(crate) dialect: SqlDialect,
    pub(crate) query_type: QueryType,
    pub(crate) select_fields: Vec<SelectField>,
    pub(crate) table: Option<String>,
    pub(crate) table_alias: Option<String>,
    pub(crate) set_clauses: Vec<SetClause>,
    pub(crate) where_conditions: Vec<WhereCondition>,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) order_by: Vec<(ColumnRef, OrderDirection)>,
    pub(crate) limit_count: Option<i64>,
    pub(crate) offset_value: Option<i64>,
}

impl QueryBuilder {
    /// Create a new query builder
    pub fn new(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            query_type: QueryType::Select,
            select_fields: Vec::new(),
            table: None,
            table_alias: None,
            set_clauses: Vec::new(),
            where_conditions: Vec::new(),
            joins: Vec::new(),
            order_by: Vec::new(),
            limit_count: None,
            offset_value: None,
        }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Add a selected column with a result alias
    pub fn select_as(mut self, column: ColumnRef, alias: &str) -> Self {
        self.select_fields.push(SelectField {
            column,
            alias: Some(alias.to_string()),
        });
        self
    }

    /// Add a selected column
    pub fn select(mut self, column: ColumnRef) -> Self {
        self.select_fields.push(SelectField { column, alias: None });
        self
    }

    /// Set the FROM table and its alias
    pub fn from(mut self, table: &str, alias: Option<&str>) -> Self {
        self.query_type = QueryType::Select;
        self.table = Some(table.to_string());
        self.table_alias = alias.map(str::to_string);
        self
    }

    /// Add a LEFT JOIN `table AS alias ON left = right`
    pub fn left_join(
        mut self,
        table: &str,
        alias: &str,
        left: ColumnRef,
        right: ColumnRef,
    ) -> Self {
        self.joins.push(JoinClause {
            table: table.to_string(),
            alias: alias.to_string(),
            on: (left, right),
        });
        self
    }
}
