pub mod collection;
pub mod engine;

pub use collection::CollectionTree;
pub use engine::{Engine, SchemaStatus, SCHEMA_VERSION};
