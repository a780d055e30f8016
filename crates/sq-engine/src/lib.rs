//! Squeeze Engine: evaluator, plan supervisor and the request-level
//! `Compressor` that ties profiler, policy, strategies and storage together.

pub mod compressor;
pub mod evaluator;
pub mod supervisor;

pub use compressor::{CompressionOutcome, CompressionReport, CompressionRequest, Compressor};
pub use evaluator::{reduction_pct, Evaluator};
pub use supervisor::{run_with_timeout, AttemptOutcome, AttemptRecord, Execution, Supervisor};

#[cfg(test)]
mod tests;
