//! Schema layer: table descriptors, relationship resolution, registry and DDL
//!
//! - `descriptor`: descriptor types and the model metadata extractor
//! - `resolver`: placeholder -> foreign-key resolution and reverse relationships
//! - `registry`: registration phase and the frozen registry
//! - `synthesizer`: CREATE TABLE / CREATE INDEX generation in dependency order

pub mod descriptor;
pub mod registry;
pub mod resolver;
pub mod synthesizer;

pub use descriptor::{
    extract, BackReference, ColumnDescriptor, ColumnSlot, ExtractedTable, RelationDescriptor,
    RelationPlaceholder, TableDescriptor,
};
pub use registry::{Registry, RegistryBuilder};
pub use synthesizer::{synthesize, SchemaPlan};
