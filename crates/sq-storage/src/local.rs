use crate::traits::{validate_key, ArtifactHandle, WorkingStorage};
use async_trait::async_trait;
use sq_core::error::{Result, SqError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Artifacts as files directly under one directory.
pub struct LocalWorkingStorage {
    root: PathBuf,
}

impl LocalWorkingStorage {
    /// The directory is created lazily on first `put`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl WorkingStorage for LocalWorkingStorage {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<ArtifactHandle> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| SqError::Storage(format!("mkdir {}: {e}", self.root.display())))?;
        fs::write(&path, data)
            .await
            .map_err(|e| SqError::Storage(format!("write {key}: {e}")))?;
        Ok(ArtifactHandle {
            key: key.to_string(),
            location: path.display().to_string(),
            size: data.len() as u64,
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        fs::read(&path)
            .await
            .map_err(|e| SqError::Storage(format!("read {key}: {e}")))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SqError::Storage(format!("rm {key}: {e}"))),
        }
    }

    async fn exists(&self, key: &str) -> bool {
        match self.path_for(key) {
            Ok(path) => fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}
