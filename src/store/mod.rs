//! The field pool and the types it holds.
pub mod pool;
pub mod types;

pub use pool::FieldPool;
pub use types::{
    Category, Field, FieldBody, Metadata, ResolvedDependencies, Shape, ShapeGroup, Value,
};
