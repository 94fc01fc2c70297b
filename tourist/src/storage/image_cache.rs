use std::path::{Path, PathBuf};

use bytes::Bytes;
use log::{debug, warn};

use crate::error::{Error, Result};

/// Flat on-disk cache of image bytes, one file per name.
#[derive(Debug, Clone)]
pub struct FileSystemImageCache {
    root: PathBuf,
}

impl FileSystemImageCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(Error::FormatError(format!("invalid cache file name: {name:?}")));
        }
        Ok(self.root.join(name))
    }

    pub async fn save(&self, name: &str, blob: &[u8]) -> Result<()> {
        let path = self.path_for(name)?;
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&path, blob).await?;
        debug!("image {name} saved to {path:?}");
        Ok(())
    }

    pub async fn load(&self, name: &str) -> Result<Option<Bytes>> {
        let path = self.path_for(name)?;
        match tokio::fs::read(&path).await {
            Ok(blob) => Ok(Some(Bytes::from(blob))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes the file. Returns whether a file was removed; failures are
    /// logged and reported as `false`.
    pub async fn delete(&self, name: &str) -> bool {
        let path = match self.path_for(name) {
            Ok(path) => path,
            Err(e) => {
                warn!("cannot delete cached image: {e}");
                return false;
            }
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("cached image {path:?} removed");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!("failed to remove cached image {path:?}: {e}");
                false
            }
        }
    }

    pub async fn contains(&self, name: &str) -> bool {
        match self.path_for(name) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}
