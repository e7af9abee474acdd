//! Model System - declarations and values for mapped entities
//!
//! - `core_trait`: the `Model` trait and the `Related` relationship field
//! - `definition`: registration-time `ModelDefinition` builder
//! - `record`: untyped `Record` values exchanged with the table handle

pub mod core_trait;
pub mod definition;
pub mod record;

// Re-export main types and traits for convenience
pub use core_trait::{Model, Related};
pub use definition::{DeclaredType, FieldDefinition, FieldType, ModelDefinition, ModelRef};
pub use record::{FieldValue, Record};
