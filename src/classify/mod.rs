//! Dependency classification of equation arguments.

pub mod classifier;

pub use classifier::DependencyClassifier;
