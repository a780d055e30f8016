use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// An immutable document held for the duration of one request.
///
/// Content is shared behind an `Arc`, so cloning a `Document` never copies
/// the bytes. Strategies always produce a new `Document`.
#[derive(Debug, Clone)]
pub struct Document {
    content: Arc<[u8]>,
    pub filename: Option<String>,
    pub content_hash: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl Document {
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: Arc::from(content.into()),
            filename: None,
            content_hash: None,
            received_at: Utc::now(),
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Compute and attach the hex SHA-256 of the content.
    pub fn with_hash(mut self) -> Self {
        self.content_hash = Some(hash_bytes(&self.content));
        self
    }

    /// Build a derived document (strategy output) that keeps the filename.
    pub fn derive(&self, content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: Arc::from(content.into()),
            filename: self.filename.clone(),
            content_hash: None,
            received_at: Utc::now(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.content
    }

    /// Cheap shared handle to the content, for moving onto blocking threads.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.content)
    }

    pub fn size_bytes(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// True when both documents share the same underlying buffer.
    pub fn same_content(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.content, &other.content)
    }
}

pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
