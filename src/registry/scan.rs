//! scan.rs
//! Discovery of model files under the configured roots.

use crate::config::RegistryConfig;
use crate::error::{ComposeError, Result};
use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use walkdir::{DirEntry, WalkDir};

fn is_skipped_dir(entry: &DirEntry, config: &RegistryConfig) -> bool {
    // Roots themselves are always walked.
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name == config.hidden_folder.as_str() || name.starts_with('_')
}

/// The model name encoded in a file name, if it is a model file.
fn model_name(entry: &DirEntry, config: &RegistryConfig) -> Option<String> {
    if !entry.file_type().is_file() {
        return None;
    }
    let file_name = entry.file_name().to_str()?;
    let suffix = format!(".{}", config.extension);
    let name = file_name.strip_prefix(config.prefix.as_str())?.strip_suffix(suffix.as_str())?;
    (!name.is_empty()).then(|| name.to_string())
}

/// Finds every model file under the configured roots.
///
/// All duplicates are collected before failing, so one error lists every
/// clashing name with all of its locations.
pub fn scan(config: &RegistryConfig) -> Result<BTreeMap<String, PathBuf>> {
    let mut found: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();

    for root in &config.roots {
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_skipped_dir(e, config));
        for entry in walker {
            let entry = entry.map_err(|err| {
                let path = err.path().map(|p| p.to_path_buf()).unwrap_or_else(|| root.clone());
                let source = err.into_io_error().unwrap_or_else(|| io::Error::other("directory loop"));
                ComposeError::Io { path, source }
            })?;
            if let Some(name) = model_name(&entry, config) {
                tracing::debug!(model = %name, path = %entry.path().display(), "found model file");
                found.entry(name).or_default().push(entry.into_path());
            }
        }
    }

    let duplicates: Vec<(String, Vec<PathBuf>)> =
        found.iter().filter(|(_, paths)| paths.len() > 1).map(|(n, p)| (n.clone(), p.clone())).collect();
    if !duplicates.is_empty() {
        return Err(ComposeError::DuplicateModel { duplicates });
    }

    tracing::info!(models = found.len(), roots = config.roots.len(), "scanned model roots");
    Ok(found.into_iter().filter_map(|(name, mut paths)| Some((name, paths.pop()?))).collect())
}
