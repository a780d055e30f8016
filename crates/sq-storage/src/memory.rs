use crate::traits::{validate_key, ArtifactHandle, WorkingStorage};
use async_trait::async_trait;
use parking_lot::RwLock;
use sq_core::error::{Result, SqError};
use std::collections::HashMap;

/// In-process backend for tests and storage-less deployments.
#[derive(Default)]
pub struct MemoryWorkingStorage {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryWorkingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl WorkingStorage for MemoryWorkingStorage {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<ArtifactHandle> {
        validate_key(key)?;
        self.entries.write().insert(key.to_string(), data.to_vec());
        Ok(ArtifactHandle {
            key: key.to_string(),
            location: format!("mem://{key}"),
            size: data.len() as u64,
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| SqError::Storage(format!("no artifact {key:?}")))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }
}
