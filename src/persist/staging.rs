//! Temporary staging directories

use std::path::Path;

/// Prefix of every staging directory name
const STAGING_PREFIX: &str = "coub-archive-temporary-";

/// A private directory that artifacts are written to before commit
///
/// The directory and anything left in it are removed on drop, so an
/// interrupted write never leaks into the archive.
#[derive(Debug)]
pub struct Staging {
    dir: tempfile::TempDir,
}

impl Staging {
    /// Create a fresh staging directory inside `root`, creating `root` if needed
    pub async fn create(root: &Path) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(root).await?;
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(root)?;
        Ok(Self { dir })
    }

    /// Location of the staging directory
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `bytes` to `name` (relative, may contain subdirectories)
    pub async fn write(&self, name: impl AsRef<Path>, bytes: &[u8]) -> std::io::Result<()> {
        let path = self.dir.path().join(name.as_ref());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await
    }
}
