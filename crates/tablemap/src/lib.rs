//! # tablemap
//!
//! Maps declaratively defined models onto relational tables: extracts table
//! descriptors from model definitions, resolves relationships between them,
//! synthesizes the schema, compiles CRUD calls into parameterized SQL, and
//! hydrates joined rows back into nested records up to a requested depth.
//!
//! ```ignore
//! let db = DatabaseBuilder::connect(MapperConfig::with_url("sqlite::memory:"))
//!     .await?
//!     .register::<Flavor>()?
//!     .register::<Coffee>()?
//!     .initialize()
//!     .await?;
//!
//! let coffees = db.table::<Coffee>()?;
//! let coffee = coffees.find_one(1, 1).await?;
//! ```

pub mod backends;
pub mod config;
pub mod database;
pub mod error;
pub mod hydration;
pub mod model;
pub mod query;
pub mod schema;
pub mod table;
pub mod validation;

// Re-export core traits and types
pub use backends::{DatabaseExecutor, DatabaseRow, DatabaseValue, FromDatabaseValue, SqlDialect};
pub use config::{MapperConfig, PoolConfig, UpsertStrategy};
pub use database::{Database, DatabaseBuilder};
pub use error::*;
pub use model::*;
pub use query::{FindQuery, OrderDirection, Page};
pub use schema::{ColumnDescriptor, Registry, TableDescriptor};
pub use table::{Table, TableHandle};
pub use validation::{DescriptorValidator, RecordValidator};
