//! Application state shared across all handlers.

use sq_engine::Compressor;
use std::sync::Arc;

const MIB: u64 = 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub compressor: Arc<Compressor>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(compressor: Compressor) -> Self {
        Self { compressor: Arc::new(compressor), start_time: std::time::Instant::now() }
    }

    /// Request bodies may exceed the document ceiling by multipart overhead.
    pub fn body_limit(&self) -> usize {
        let limit = self.compressor.policy().hard_ceiling().saturating_add(MIB);
        usize::try_from(limit).unwrap_or(usize::MAX)
    }
}
