//! Scoped temporary working folders.

use crate::CoreError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// A working directory that exists exactly for the lifetime of this value.
///
/// Creation fails if the path already exists — a leftover folder means a
/// previous run of the same operation crashed without unwinding, and
/// silently reusing it would mix two operations' state. The folder is
/// removed on drop, on success and on error paths alike.
#[derive(Debug)]
pub struct ScopedTempFolder {
    path: PathBuf,
}

impl ScopedTempFolder {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        if path.exists() {
            return Err(CoreError::TempFolderExists(path.display().to_string()));
        }
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedTempFolder {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            warn!(path = %self.path.display(), "failed to remove temp folder: {e}");
        }
    }
}
