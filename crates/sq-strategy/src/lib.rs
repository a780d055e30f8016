//! Compression strategies and the registry that names them.
//!
//! - `fast-codec` / `aggressive-codec`: Ghostscript pdfwrite in a child process
//! - `stream-optimizer`: lopdf prune + Flate, no pixel changes
//! - `image-recode`: lopdf + image, JPEG re-encode of raster images
//!
//! Strategies never decide whether their output is worth keeping; that is
//! the evaluator's job upstream.

pub mod cancel;
pub mod ghostscript;
pub mod image_recode;
pub mod registry;
pub mod stream_optimize;
pub mod traits;

pub use cancel::{run_blocking, CancelFlag, CancelOnDrop};
pub use ghostscript::{ghostscript_args, GhostscriptStrategy};
pub use image_recode::ImageRecoder;
pub use registry::StrategyRegistry;
pub use stream_optimize::StreamOptimizer;
pub use traits::Strategy;
