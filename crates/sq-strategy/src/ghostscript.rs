//! Codec-level recompression through an external Ghostscript process.

use crate::cancel::CancelFlag;
use crate::traits::Strategy;
use async_trait::async_trait;
use sq_core::{CostClass, Document, StrategyError, StrategyParams};
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const STDERR_LIMIT: usize = 512;

pub struct GhostscriptStrategy {
    binary: String,
    cost: CostClass,
    timeout: Duration,
}

impl GhostscriptStrategy {
    pub fn new(binary: impl Into<String>, cost: CostClass, timeout: Duration) -> Self {
        Self { binary: binary.into(), cost, timeout }
    }
}

/// pdfwrite arguments for the given parameters.
pub fn ghostscript_args(params: &StrategyParams, input: &Path, output: &Path) -> Vec<String> {
    let dpi = params.resolution_dpi;
    vec![
        "-sDEVICE=pdfwrite".into(),
        "-dCompatibilityLevel=1.4".into(),
        format!("-dPDFSETTINGS={}", params.preset.pdf_settings()),
        "-dNOPAUSE".into(),
        "-dBATCH".into(),
        "-dQUIET".into(),
        "-dSAFER".into(),
        "-dDetectDuplicateImages=true".into(),
        "-dCompressFonts=true".into(),
        "-dSubsetFonts=true".into(),
        "-dEmbedAllFonts=true".into(),
        "-dDownsampleColorImages=true".into(),
        "-dDownsampleGrayImages=true".into(),
        "-dDownsampleMonoImages=true".into(),
        "-dColorImageDownsampleType=/Average".into(),
        "-dGrayImageDownsampleType=/Average".into(),
        "-dMonoImageDownsampleType=/Subsample".into(),
        format!("-dColorImageResolution={dpi}"),
        format!("-dGrayImageResolution={dpi}"),
        format!("-dMonoImageResolution={dpi}"),
        format!("-dJPEGQ={}", params.image_quality),
        "-dAutoRotatePages=/None".into(),
        "-dColorConversionStrategy=/sRGB".into(),
        format!("-sOutputFile={}", output.display()),
        input.display().to_string(),
    ]
}

#[async_trait]
impl Strategy for GhostscriptStrategy {
    fn name(&self) -> &'static str {
        "ghostscript"
    }

    fn cost_class(&self) -> CostClass {
        self.cost
    }

    fn intrinsic_timeout(&self) -> Duration {
        self.timeout
    }

    async fn compress(
        &self,
        input: &Document,
        params: &StrategyParams,
        cancel: &CancelFlag,
    ) -> Result<Document, StrategyError> {
        cancel.check()?;

        let workdir = tempfile::tempdir()?;
        let input_path = workdir.path().join("input.pdf");
        let output_path = workdir.path().join("output.pdf");
        tokio::fs::write(&input_path, input.bytes()).await?;

        // The child is killed if this future is dropped (timeout, disconnect).
        let child = Command::new(&self.binary)
            .args(ghostscript_args(params, &input_path, &output_path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => StrategyError::Unavailable(format!("{} not found", self.binary)),
                _ => StrategyError::Io(e.to_string()),
            })?;

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr: String = stderr.chars().take(STDERR_LIMIT).collect();
            return Err(StrategyError::Process { code: output.status.code(), stderr });
        }

        let compressed = tokio::fs::read(&output_path).await?;
        if compressed.is_empty() {
            return Err(StrategyError::EmptyOutput);
        }
        tracing::debug!(
            preset = params.preset.pdf_settings(),
            dpi = params.resolution_dpi,
            jpeg_q = params.image_quality,
            bytes = compressed.len(),
            "ghostscript finished"
        );
        Ok(input.derive(compressed))
    }
}
