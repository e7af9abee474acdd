//! Query Builder Module - dialect-aware statement building
//!
//! `QueryBuilder` is the fluent builder every statement goes through;
//! `statements` compiles table-handle operations onto it.

pub mod builder;
pub mod dml;
pub mod find;
pub mod ordering;
pub mod sql_generation;
pub mod statements;
pub mod types;
pub mod upsert;
pub mod where_clause;

// Re-export main types and builder
pub use builder::QueryBuilder;
pub use find::{FindQuery, Page};
pub use statements::Statement;
pub use types::{ColumnRef, OrderDirection, QueryOperator};
pub use upsert::UpsertBuilder;
