//! Squeeze Profiler: cheap structural probe of an incoming PDF.
//!
//! Produces a [`DocumentProfile`] (page count, image count, largest image
//! area, scanned-vs-text) without modifying the input. Inspection never
//! fails: any parse error, or a panic inside the PDF parser, yields a
//! zeroed profile so the policy engine picks its most conservative plan.

pub mod inspect;
pub mod sample;

use lopdf::Document as PdfDocument;
use sq_core::config::ProfilerConfig;
use sq_core::{Document, DocumentProfile};
use std::panic::{self, AssertUnwindSafe};

pub use inspect::PageStats;

/// Document profiler with a bounded per-page image sample.
#[derive(Debug, Clone)]
pub struct Profiler {
    pub image_sample_limit: usize,
}

impl Profiler {
    pub fn new(image_sample_limit: usize) -> Self {
        Self { image_sample_limit: image_sample_limit.max(1) }
    }

    pub fn from_config(config: &ProfilerConfig) -> Self {
        Self::new(config.image_sample_limit)
    }

    pub fn profile(&self, document: &Document) -> DocumentProfile {
        self.profile_bytes(document.bytes())
    }

    pub fn profile_bytes(&self, bytes: &[u8]) -> DocumentProfile {
        let size_bytes = bytes.len() as u64;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.inspect(bytes)));
        match outcome {
            Ok(Ok(pages)) => summarize(size_bytes, &pages),
            Ok(Err(e)) => {
                tracing::warn!(size_bytes, error = %e, "profiling failed, using zeroed profile");
                DocumentProfile::zeroed(size_bytes)
            }
            Err(_) => {
                tracing::warn!(size_bytes, "pdf parser panicked, using zeroed profile");
                DocumentProfile::zeroed(size_bytes)
            }
        }
    }

    fn inspect(&self, bytes: &[u8]) -> lopdf::Result<Vec<PageStats>> {
        let pdf = PdfDocument::load_mem(bytes)?;
        Ok(pdf
            .get_pages()
            .values()
            .map(|page_id| inspect::inspect_page(&pdf, *page_id, self.image_sample_limit))
            .collect())
    }
}

impl Default for Profiler {
    fn default() -> Self {
        Self::from_config(&ProfilerConfig::default())
    }
}

/// Fold page stats into a profile.
pub fn summarize(size_bytes: u64, pages: &[PageStats]) -> DocumentProfile {
    let page_count = pages.len() as u32;
    let image_count = pages.iter().fold(0u32, |acc, p| acc.saturating_add(p.images));
    let largest_image_pixels = pages.iter().map(|p| p.largest_image_pixels).max().unwrap_or(0);
    let image_pages = pages.iter().filter(|p| p.images > 0).count() as u32;
    let any_text = pages.iter().any(|p| p.has_text);

    DocumentProfile {
        size_bytes,
        page_count,
        image_count,
        largest_image_pixels,
        is_scanned: page_count > 0 && !any_text && image_pages * 2 >= page_count,
    }
}
