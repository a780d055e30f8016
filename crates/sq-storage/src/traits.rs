use async_trait::async_trait;
use serde::Serialize;
use sq_core::error::{Result, SqError};

/// Where an artifact ended up after a `put`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactHandle {
    pub key: String,
    /// Backend-specific location (a path, or `mem://<key>`).
    pub location: String,
    pub size: u64,
}

/// Flat key -> bytes store for working copies and candidate outputs.
#[async_trait]
pub trait WorkingStorage: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Overwrites an existing key.
    async fn put(&self, key: &str, data: &[u8]) -> Result<ArtifactHandle>;

    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> bool;
}

/// Keys are single path components: no separators, no `.`/`..`.
pub fn validate_key(key: &str) -> Result<()> {
    let bad = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\', '\0']);
    if bad {
        return Err(SqError::Storage(format!("invalid artifact key {key:?}")));
    }
    Ok(())
}
