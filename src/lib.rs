//! Declarative assembly of stock-flow dynamical-system models.
//!
//! A model is a pool of named fields (parameters, state variables, differential
//! variables and size groups). Loosely written definitions are normalized into
//! canonical form, given shapes, merged with other models and have their
//! equation arguments classified, producing a pool an integrator can step.

pub mod classify;
pub mod config;
pub mod dimension;
pub mod equation;
pub mod error;
pub mod merge;
pub mod normalize;
pub mod notice;
pub mod registry;
pub mod store;

pub mod analysis {
    pub mod topology;
}

pub mod display {
    pub mod summary;
}

pub use config::{DuplicatePolicy, EngineConfig, RegistryConfig, Strictness};
pub use error::{ComposeError, Result};
pub use notice::{Notice, NoticeKind};
pub use registry::{ComposedModel, Composer, ModelRegistry, ModelSource};
