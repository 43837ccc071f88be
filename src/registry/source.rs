//! source.rs
//! A model as authored: raw logics plus presets and pass-through data.

use crate::dimension::{DimensionMap, ShapeDeclaration};
use crate::error::{ComposeError, Result};
use crate::normalize::RawLogics;
use crate::store::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A named set of initial conditions and parameter values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preset {
    pub fields: BTreeMap<String, Value>,
    pub com: String,
    /// Plot requests; carried untouched.
    pub plots: serde_json::Value,
}

/// Shape layout of a model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeSpec {
    pub declaration: ShapeDeclaration,
    /// Overrides the engine's dimension map for this model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dims: Option<DimensionMap>,
}

/// On-disk form of a model file.
#[derive(Debug, Deserialize)]
struct ModelFile {
    #[serde(default)]
    description: String,
    logics: serde_json::Value,
    #[serde(default)]
    presets: BTreeMap<String, Preset>,
    #[serde(default)]
    supplements: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    shapes: ShapeSpec,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSource {
    pub name: String,
    pub description: String,
    pub logics: RawLogics,
    pub presets: BTreeMap<String, Preset>,
    /// Opaque extras (e.g. plotting hints) nothing here interprets.
    pub supplements: BTreeMap<String, serde_json::Value>,
    pub shapes: ShapeSpec,
    /// The file it was read from; `None` for models built in Rust.
    pub location: Option<PathBuf>,
}

impl ModelSource {
    pub fn new(name: impl Into<String>, logics: RawLogics) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            logics,
            presets: BTreeMap::new(),
            supplements: BTreeMap::new(),
            shapes: ShapeSpec::default(),
            location: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_preset(mut self, name: impl Into<String>, preset: Preset) -> Self {
        self.presets.insert(name.into(), preset);
        self
    }

    pub fn with_shapes(mut self, shapes: ShapeSpec) -> Self {
        self.shapes = shapes;
        self
    }

    pub fn from_json_str(name: impl Into<String>, text: &str) -> std::result::Result<Self, serde_json::Error> {
        let file: ModelFile = serde_json::from_str(text)?;
        let logics = RawLogics::from_json(file.logics)
            .map_err(|e| <serde_json::Error as serde::de::Error>::custom(e.to_string()))?;
        Ok(Self {
            name: name.into(),
            description: file.description,
            logics,
            presets: file.presets,
            supplements: file.supplements,
            shapes: file.shapes,
            location: None,
        })
    }

    pub fn from_path(name: impl Into<String>, path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ComposeError::Io { path: path.to_path_buf(), source })?;
        let mut source = Self::from_json_str(name, &text)
            .map_err(|source| ComposeError::Json { path: path.to_path_buf(), source })?;
        source.location = Some(path.to_path_buf());
        Ok(source)
    }
}
