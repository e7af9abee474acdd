//! Filters, ordering and paging for `find_many`

use serde::Serialize;

use super::types::OrderDirection;
use crate::backends::DatabaseValue;
use crate::model::{FieldValue, Record};

/// Filters, ordering, pagination and hydration depth for one call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    pub filters: Vec<(String, FieldValue)>,
    pub order_by: Vec<(String, OrderDirection)>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub depth: usize,
}

impl FindQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equality filter; NULL matches rows where the column is NULL
    pub fn filter<T: Into<DatabaseValue>>(mut self, column: &str, value: T) -> Self {
        self.filters
            .push((column.to_string(), FieldValue::Value(value.into())));
        self
    }

    /// Filter a relationship column by a nested record's key
    pub fn filter_entity(mut self, column: &str, record: Record) -> Self {
        self.filters
            .push((column.to_string(), FieldValue::Entity(Box::new(record))));
        self
    }

    pub fn order_by(mut self, column: &str) -> Self {
        self.order_by.push((column.to_string(), OrderDirection::Asc));
        self
    }

    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.order_by.push((column.to_string(), OrderDirection::Desc));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }
}

/// One page of `find_many` results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub offset: i64,
    pub limit: Option<i64>,
    pub data: Vec<T>,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn try_map<U, E, F>(self, f: F) -> Result<Page<U>, E>
    where
        F: FnMut(T) -> Result<U, E>,
    {
        Ok(Page {
            offset: self.offset,
            limit: self.limit,
            data: self.data.into_iter().map(f).collect::<Result<_, _>>()?,
        })
    }
}
