//! Model discovery, loading and composition by name.

pub mod composer;
pub mod scan;
pub mod source;

pub use composer::{ComposedModel, Composer};
pub use source::{ModelSource, Preset, ShapeSpec};

use crate::config::EngineConfig;
use crate::error::{ComposeError, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Where a registered model comes from.
#[derive(Debug, Clone)]
pub enum ModelLocation {
    File(PathBuf),
    Memory(Box<ModelSource>),
}

impl ModelLocation {
    fn display_path(&self) -> PathBuf {
        match self {
            ModelLocation::File(path) => path.clone(),
            ModelLocation::Memory(_) => PathBuf::from("<in-memory>"),
        }
    }
}

/// Name -> model lookup, backed by discovered files and in-memory sources.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    composer: Composer,
    models: BTreeMap<String, ModelLocation>,
}

impl ModelRegistry {
    /// An empty registry; nothing is scanned.
    pub fn new(config: EngineConfig) -> Self {
        Self { composer: Composer::new(config), models: BTreeMap::new() }
    }

    /// Scans the configured roots.
    pub fn discover(config: EngineConfig) -> Result<Self> {
        let found = scan::scan(&config.registry)?;
        let mut registry = Self::new(config);
        registry.models = found.into_iter().map(|(name, path)| (name, ModelLocation::File(path))).collect();
        Ok(registry)
    }

    /// Adds a model defined in Rust. Names must be unique across files and memory.
    pub fn register(&mut self, source: ModelSource) -> Result<()> {
        if let Some(existing) = self.models.get(&source.name) {
            let incoming = source.location.clone().unwrap_or_else(|| PathBuf::from("<in-memory>"));
            return Err(ComposeError::DuplicateModel {
                duplicates: vec![(source.name.clone(), vec![existing.display_path(), incoming])],
            });
        }
        tracing::debug!(model = %source.name, "registered model");
        self.models.insert(source.name.clone(), ModelLocation::Memory(Box::new(source)));
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn location(&self, name: &str) -> Option<&ModelLocation> {
        self.models.get(name)
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn load(&self, name: &str) -> Result<ModelSource> {
        match self.models.get(name) {
            Some(ModelLocation::File(path)) => ModelSource::from_path(name, path),
            Some(ModelLocation::Memory(source)) => Ok(source.as_ref().clone()),
            None => Err(ComposeError::ModelNotFound {
                name: name.to_string(),
                available: self.models.keys().cloned().collect(),
            }),
        }
    }

    pub fn compose(&self, name: &str) -> Result<ComposedModel> {
        self.composer.compose(self.load(name)?)
    }

    /// Composes `name` with each of `donors` merged in, in order.
    pub fn compose_with(&self, name: &str, donors: &[&str]) -> Result<ComposedModel> {
        let base = self.load(name)?;
        let donors = donors.iter().map(|d| self.load(d)).collect::<Result<Vec<_>>>()?;
        self.composer.compose_all(base, donors)
    }
}
