//! Filesystem-backed store for downloaded models.
//!
//! Each model lives in its own directory under the store root; a model counts
//! as downloaded when its directory contains at least one entry. Operations
//! on different models touch disjoint paths and are safe to run concurrently.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::catalog::{self, ModelSpec};

/// Presence, size and deletion queries for downloaded models
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default store root under the platform data directory
    pub fn default_root() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("murmur")
            .join("models")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory a model occupies, whether or not it is downloaded
    pub fn model_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Whether a model is downloaded (its directory exists and is non-empty)
    pub fn is_present(&self, name: &str) -> bool {
        let dir = self.model_dir(name);
        if !dir.is_dir() {
            return false;
        }
        fs::read_dir(&dir)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }

    /// Path to a downloaded model's directory, or `None` if not downloaded
    pub fn path_of(&self, name: &str) -> Option<PathBuf> {
        self.is_present(name).then(|| self.model_dir(name))
    }

    /// Total size of a downloaded model on disk, in bytes
    pub fn size_on_disk(&self, name: &str) -> u64 {
        dir_size(&self.model_dir(name))
    }

    /// Delete a downloaded model. Returns `true` if something was removed.
    pub fn delete(&self, name: &str) -> io::Result<bool> {
        let dir = self.model_dir(name);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)?;
        log::info!("deleted model {name}");
        Ok(true)
    }

    /// Catalog entries that are downloaded in this store
    pub fn downloaded(&self) -> Vec<&'static ModelSpec> {
        catalog::MODELS
            .iter()
            .filter(|spec| self.is_present(spec.name))
            .collect()
    }
}

fn dir_size(dir: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    let mut total = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            total += dir_size(&path);
        } else if let Ok(metadata) = entry.metadata() {
            total += metadata.len();
        }
    }
    total
}
