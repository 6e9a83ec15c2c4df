use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::error::ReelResult;

/// Remove a file, treating a missing file as already removed.
pub fn remove_idempotent(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Exclusively owned temporary file.
///
/// The file is deleted exactly once: either through [`TempAsset::release`] or when the guard is
/// dropped. Ownership moves between pipeline stages together with the guard.
#[derive(Debug)]
pub struct TempAsset {
    path: PathBuf,
    released: bool,
}

impl TempAsset {
    /// Create an empty, uniquely named file in `dir`.
    pub fn create_in(dir: &Path, prefix: &str, suffix: &str) -> ReelResult<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create work directory '{}'", dir.display()))?;
        let file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(dir)
            .with_context(|| format!("failed to create temporary file in '{}'", dir.display()))?;
        let path = file
            .into_temp_path()
            .keep()
            .context("failed to detach temporary file")?;
        Ok(Self {
            path,
            released: false,
        })
    }

    /// Path of the owned file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now and report IO failures.
    pub fn release(mut self) -> ReelResult<()> {
        self.released = true;
        remove_idempotent(&self.path)
            .with_context(|| format!("failed to remove '{}'", self.path.display()))?;
        Ok(())
    }

    /// Stop tracking the file and hand back its path without deleting it.
    pub fn persist(mut self) -> PathBuf {
        self.released = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for TempAsset {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = remove_idempotent(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove temporary file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("never-created.wav");
        remove_idempotent(&p).unwrap();
        remove_idempotent(&p).unwrap();
    }

    #[test]
    fn drop_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let asset = TempAsset::create_in(dir.path(), "t-", ".png").unwrap();
        let p = asset.path().to_path_buf();
        assert!(p.is_file());
        drop(asset);
        assert!(!p.exists());
    }

    #[test]
    fn release_after_external_delete_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let asset = TempAsset::create_in(dir.path(), "t-", ".wav").unwrap();
        std::fs::remove_file(asset.path()).unwrap();
        asset.release().unwrap();
    }

    #[test]
    fn persist_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let asset = TempAsset::create_in(dir.path(), "t-", ".mp4").unwrap();
        let p = asset.persist();
        assert!(p.is_file());
    }
}
