use serde::{Deserialize, Serialize};

/// Read-only structural summary used to drive policy decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentProfile {
    pub size_bytes: u64,
    pub page_count: u32,
    pub image_count: u32,
    pub largest_image_pixels: u64,
    /// True only if at least half of the pages carry images and no
    /// extractable text.
    pub is_scanned: bool,
}

impl DocumentProfile {
    /// The profile returned when inspection fails: structure unknown.
    pub fn zeroed(size_bytes: u64) -> Self {
        Self { size_bytes, ..Default::default() }
    }

    pub fn is_zeroed(&self) -> bool {
        self.page_count == 0 && self.image_count == 0 && self.largest_image_pixels == 0 && !self.is_scanned
    }

    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / 1024.0 / 1024.0
    }
}
