//! Local filesystem back-end

use super::{Persister, Staging};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Persists into a directory tree by renaming complete staging directories
///
/// The staging root must be on the same filesystem as the archive root so
/// that the final `rename` is atomic.
#[derive(Debug, Clone)]
pub struct FilesystemPersister {
    root: PathBuf,
    temp_root: PathBuf,
}

impl FilesystemPersister {
    /// Persist under `root`, staging under `temp_root`
    pub fn new(root: PathBuf, temp_root: PathBuf) -> Self {
        Self { root, temp_root }
    }

    /// Archive root directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Persister for FilesystemPersister {
    fn staging_root(&self) -> &Path {
        &self.temp_root
    }

    async fn commit(&self, staging: Staging, target: &Path) -> Result<()> {
        let dest = self.root.join(target);

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::persist(target, e))?;
        }

        // The staging directory disappears with the rename; dropping `staging`
        // afterwards finds nothing left to clean up.
        tokio::fs::rename(staging.path(), &dest)
            .await
            .map_err(|e| Error::persist(target, e))?;

        drop(staging);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "filesystem"
    }
}
