//! Query Builder Types - Core types and enums for query building

use std::fmt;

use crate::backends::{DatabaseValue, SqlDialect};

/// Query operator types
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOperator {
    Equal,
    In,
    IsNull,
}

impl fmt::Display for QueryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOperator::Equal => write!(f, "="),
            QueryOperator::In => write!(f, "IN"),
            QueryOperator::IsNull => write!(f, "IS NULL"),
        }
    }
}

/// Column reference, optionally qualified by a table alias
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub qualifier: Option<String>,
    pub name: String,
}

impl ColumnRef {
    pub fn new(name: &str) -> Self {
        Self {
            qualifier: None,
            name: name.to_string(),
        }
    }

    pub fn qualified(qualifier: &str, name: &str) -> Self {
        Self {
            qualifier: Some(qualifier.to_string()),
            name: name.to_string(),
        }
    }

    /// Render with dialect quoting
    pub fn to_sql(&self, dialect: SqlDialect) -> String {
        match &self.qualifier {
            Some(q) => format!("{}.{}", dialect.quote(q), dialect.quote(&self.name)),
            None => dialect.quote(&self.name),
        }
    }
}

/// Where clause condition
#[derive(Debug, Clone)]
pub struct WhereCondition {
    pub column: ColumnRef,
    pub operator: QueryOperator,
    pub value: Option<DatabaseValue>,
    /// Operands of `IN`
    pub values: Vec<DatabaseValue>,
}

/// LEFT JOIN clause
#[derive(Debug, Clone)]
pub struct JoinClause {
    pub table: String,
    pub alias: String,
    pub on: (ColumnRef, ColumnRef),
}

/// Selected column with its result alias
#[derive(Debug, Clone)]
pub struct SelectField {
    pub column: ColumnRef,
    pub alias: Option<String>,
}

/// Order by direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// Query types supported by the builder
#[derive(Debug, Clone, PartialEq)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
}

/// Set clause for UPDATE and INSERT operations
#[derive(Debug, Clone)]
pub struct SetClause {
    pub column: String,
    pub value: DatabaseValue,
}
