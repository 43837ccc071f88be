//! config.rs
//! Engine configuration, loadable from a JSON file.

use crate::dimension::DimensionMap;
use crate::error::{ComposeError, Result};
use crate::merge::MergeOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What the classifier does with an argument that names no field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Fail with `UnresolvedDependency`.
    #[default]
    Strict,
    /// Record the name under `unresolved_names` and emit a notice.
    Permissive,
}

/// How a name defined under several categories of one model is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    #[default]
    KeepFirst,
    KeepLast,
    Reject,
}

/// Where and how model files are discovered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub roots: Vec<PathBuf>,
    /// Model files are named `<prefix><model name>.<extension>`.
    pub prefix: String,
    pub extension: String,
    /// Directories with this name are skipped, as are those starting with `_`.
    pub hidden_folder: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            prefix: "_model_".to_string(),
            extension: "json".to_string(),
            hidden_folder: "Hidden".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub strictness: Strictness,
    pub duplicates: DuplicatePolicy,
    pub merge: MergeOptions,
    pub dims: DimensionMap,
    pub registry: RegistryConfig,
}

impl EngineConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ComposeError::Io { path: path.to_path_buf(), source })?;
        serde_json::from_str(&text).map_err(|source| ComposeError::Json { path: path.to_path_buf(), source })
    }

    pub fn with_roots<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.registry.roots = roots.into_iter().map(Into::into).collect();
        self
    }
}
