//! Directory operations

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::errors::DeployError;
use crate::filesys::file::File;

/// A file found while walking a directory tree
#[derive(Debug, Clone)]
pub struct WalkedFile {
    /// The file on disk
    pub file: File,

    /// Path relative to the walk root, `/`-separated on every platform
    pub relative_path: String,
}

/// A directory wrapper with path
#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    /// Create a new directory reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name of the directory, lossily converted
    ///
    /// Falls back to the canonical name for paths like `.` that have none.
    pub async fn name(&self) -> String {
        if let Some(name) = self.path.file_name() {
            return name.to_string_lossy().into_owned();
        }
        fs::canonicalize(&self.path)
            .await
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_default()
    }

    /// Recursively list regular files below this directory
    ///
    /// `skip(name, is_dir)` is asked about every entry; skipped directories
    /// are not descended into. Symbolic links are never followed.
    pub async fn walk_files<F>(&self, skip: F) -> Result<Vec<WalkedFile>, DeployError>
    where
        F: Fn(&str, bool) -> bool,
    {
        let mut files = Vec::new();
        let mut pending = vec![self.path.clone()];

        while let Some(current) = pending.pop() {
            let mut entries = fs::read_dir(&current)
                .await
                .map_err(|e| DeployError::path_read(&current, e))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| DeployError::path_read(&current, e))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| DeployError::path_read(&path, e))?;

                if file_type.is_symlink() {
                    continue;
                }

                let name = entry.file_name().to_string_lossy().into_owned();
                if skip(&name, file_type.is_dir()) {
                    continue;
                }

                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    let relative = path
                        .strip_prefix(&self.path)
                        .map_err(|e| DeployError::Internal(e.to_string()))?;

                    // Normalize to forward slashes.
                    let relative_path = relative.to_string_lossy().replace('\\', "/");
                    files.push(WalkedFile {
                        file: File::new(path),
                        relative_path,
                    });
                }
            }
        }

        Ok(files)
    }
}
