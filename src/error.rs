//! error.rs
//! The error taxonomy of the composition pipeline.

use crate::equation::ExpressionError;
use crate::merge::MergeConflict;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = ComposeError> = std::result::Result<T, E>;

/// Every fatal outcome of loading, normalizing, dimensioning, classifying or
/// merging a model.
///
/// Non-fatal diagnostics (normalizer notices, merge conflicts in lenient mode)
/// are collected as values instead; see [`crate::notice::Notice`] and
/// [`crate::merge::MergeReport`].
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Field '{field}' in category '{category}' has no '{missing}' attribute. Required keys: {required}")]
    Schema { field: String, category: String, missing: String, required: String },

    #[error("Unknown category '{category}'. Known categories and synonyms: {known}")]
    Category { category: String, known: String },

    #[error("Size group '{group}' declares a count of {count} but lists {listed} labels")]
    DimensionMismatch { group: String, count: usize, listed: usize },

    #[error("Field '{field}' is declared in more than one shape group: {groups:?}")]
    AmbiguousShape { field: String, groups: Vec<String> },

    #[error("Argument '{argument}' of field '{field}' does not name any field of the pool")]
    UnresolvedDependency { field: String, argument: String },

    #[error("Field '{field}' is defined in several categories: {categories:?}")]
    DuplicateField { field: String, categories: Vec<String> },

    #[error("{}", format_duplicates(.duplicates))]
    DuplicateModel { duplicates: Vec<(String, Vec<PathBuf>)> },

    #[error("Model '{name}' not found. Available models: {available:?}")]
    ModelNotFound { name: String, available: Vec<String> },

    #[error("Preset '{preset}' not found in model '{model}'. Available presets: {available:?}")]
    PresetNotFound { model: String, preset: String, available: Vec<String> },

    #[error("{} merge conflict(s) left unresolved: {}", .conflicts.len(), format_conflicts(.conflicts))]
    MergeConflict { conflicts: Vec<MergeConflict> },

    #[error("Cycle among state variables: {}", format_cycles(.cycles))]
    Cycle { cycles: Vec<Vec<String>> },

    #[error("Invalid equation for field '{field}': {source}")]
    Equation {
        field: String,
        #[source]
        source: ExpressionError,
    },

    #[error("Invalid '{key}' attribute on field '{field}': {reason}")]
    InvalidAttribute { field: String, key: String, reason: String },

    #[error("Failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse '{}': {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn format_duplicates(duplicates: &[(String, Vec<PathBuf>)]) -> String {
    let mut msg = String::from("Several models share the same name:");
    for (name, locations) in duplicates {
        let joined: Vec<String> = locations.iter().map(|p| p.display().to_string()).collect();
        msg.push_str(&format!("\n  '{}' found at: {}", name, joined.join(", ")));
    }
    msg
}

fn format_conflicts(conflicts: &[MergeConflict]) -> String {
    conflicts.iter().map(|c| c.to_string()).collect::<Vec<_>>().join("; ")
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles.iter().map(|c| format!("[{}]", c.join(" -> "))).collect::<Vec<_>>().join(", ")
}
