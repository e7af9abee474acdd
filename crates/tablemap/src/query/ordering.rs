//! Query Builder ORDER BY and pagination operations

use super::builder::QueryBuilder;
use super::types::*;

impl QueryBuilder {
    /// Add ORDER BY clause (ascending)
    pub fn order_by(self, column: ColumnRef) -> Self {
        self.order_by_direction(column, OrderDirection::Asc)
    }

    /// Add ORDER BY clause (descending)
    pub fn order_by_desc(self, column: ColumnRef) -> Self {
        self.order_by_direction(column, OrderDirection::Desc)
    }

    pub fn order_by_direction(mut self, column: ColumnRef, direction: OrderDirection) -> Self {
        self.order_by.push((column, direction));
        self
    }

    /// Add LIMIT clause
    pub fn limit(mut self, count: i64) -> Self {
        self.limit_count = Some(count);
        self
    }

    /// Add OFFSET clause
    pub fn offset(mut self, count: i64) -> Self {
        self.offset_value = Some(count);
        self
    }
}
