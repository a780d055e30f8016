//! Structural optimization: drop dead objects, Flate every compressible
//! stream, renumber and rewrite. No pixel data is touched.

use crate::cancel::{run_blocking, CancelFlag};
use crate::traits::Strategy;
use async_trait::async_trait;
use lopdf::{Document as PdfDocument, Object};
use sq_core::{CostClass, Document, StrategyError, StrategyParams};
use std::time::Duration;

pub struct StreamOptimizer {
    timeout: Duration,
}

impl StreamOptimizer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for StreamOptimizer {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

/// Flate every compressible stream, checking `cancel` before each one.
/// Returns how many streams were visited.
pub fn compress_streams(pdf: &mut PdfDocument, cancel: &CancelFlag) -> Result<usize, StrategyError> {
    let mut visited = 0;
    for object in pdf.objects.values_mut() {
        cancel.check()?;
        if let Object::Stream(stream) = object {
            if stream.allows_compression {
                // A stream that fails to deflate is left as is.
                let _ = stream.compress();
                visited += 1;
            }
        }
    }
    Ok(visited)
}

pub fn optimize_bytes(bytes: &[u8], cancel: &CancelFlag) -> Result<Vec<u8>, StrategyError> {
    let mut pdf = PdfDocument::load_mem(bytes).map_err(|e| StrategyError::Pdf(e.to_string()))?;
    cancel.check()?;

    let emptied = pdf.delete_zero_length_streams().len();
    let pruned = pdf.prune_objects().len();
    cancel.check()?;

    compress_streams(&mut pdf, cancel)?;
    cancel.check()?;

    pdf.renumber_objects();
    let mut out = Vec::with_capacity(bytes.len());
    pdf.save_to(&mut out).map_err(|e| StrategyError::Pdf(e.to_string()))?;
    if out.is_empty() {
        return Err(StrategyError::EmptyOutput);
    }

    tracing::debug!(emptied, pruned, before = bytes.len(), after = out.len(), "stream optimize");
    Ok(out)
}

#[async_trait]
impl Strategy for StreamOptimizer {
    fn name(&self) -> &'static str {
        "stream-optimizer"
    }

    fn cost_class(&self) -> CostClass {
        CostClass::Cheap
    }

    fn intrinsic_timeout(&self) -> Duration {
        self.timeout
    }

    async fn compress(
        &self,
        input: &Document,
        _params: &StrategyParams,
        cancel: &CancelFlag,
    ) -> Result<Document, StrategyError> {
        let bytes = input.shared_bytes();
        let out = run_blocking(cancel, move |flag| optimize_bytes(&bytes, flag)).await?;
        Ok(input.derive(out))
    }
}
