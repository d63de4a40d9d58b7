//! Worker discovery
//!
//! One executable script per exchange lives in the bot directory. The
//! worker id is the script's file name with its extension removed.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{HerdError, Result};

/// A worker script found in the bot directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerScript {
    pub id: String,
    pub script_path: PathBuf,
    pub working_directory: PathBuf,
}

/// Lists worker scripts from a directory
#[derive(Debug, Clone)]
pub struct WorkerRegistry {
    directory: PathBuf,
    extension: String,
}

impl WorkerRegistry {
    pub fn new(directory: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        Self {
            directory: directory.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Paths of every worker script in the directory, sorted by file name.
    ///
    /// An unreadable directory is a hard error; there is no partial result.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.directory).map_err(|source| HerdError::Directory {
            path: self.directory.clone(),
            source,
        })?;

        let mut scripts = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| HerdError::Directory {
                path: self.directory.clone(),
                source,
            })?;
            let path = entry.path();
            if self.is_worker_script(&path) {
                scripts.push(path);
            }
        }
        scripts.sort();

        debug!(
            "Discovered {} worker scripts in {}",
            scripts.len(),
            self.directory.display()
        );
        Ok(scripts)
    }

    /// Discover and resolve ids in one pass
    pub fn workers(&self) -> Result<Vec<WorkerScript>> {
        Ok(self
            .discover()?
            .into_iter()
            .filter_map(|script_path| {
                let id = worker_id(&script_path)?;
                Some(WorkerScript {
                    id,
                    script_path,
                    working_directory: self.directory.clone(),
                })
            })
            .collect())
    }

    fn is_worker_script(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == self.extension)
    }
}

/// Canonical worker id: base file name without extension
pub fn worker_id(script_path: &Path) -> Option<String> {
    script_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}
