use thiserror::Error;

/// Request-level errors. Only these ever reach the caller; per-strategy
/// problems are recorded as [`StrategyError`] and recovered by the supervisor.
#[derive(Error, Debug)]
pub enum SqError {
    #[error("Input rejected: {0}")]
    InputRejected(String),
    #[error("Document too large: {size} bytes exceeds limit of {limit} bytes")]
    SizeExceeded { size: u64, limit: u64 },
    #[error("Fatal: {0}")]
    Fatal(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SqError {
    /// Errors the caller is told about directly, as opposed to degraded
    /// internally to "return original".
    pub fn is_client_error(&self) -> bool {
        matches!(self, SqError::InputRejected(_) | SqError::SizeExceeded { .. })
    }
}

pub type Result<T> = std::result::Result<T, SqError>;

/// Why a single strategy attempt produced no candidate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyError {
    #[error("strategy not available: {0}")]
    Unavailable(String),
    #[error("process exited with {code:?}: {stderr}")]
    Process { code: Option<i32>, stderr: String },
    #[error("pdf error: {0}")]
    Pdf(String),
    #[error("image error: {0}")]
    Image(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("strategy produced empty output")]
    EmptyOutput,
    #[error("cancelled")]
    Cancelled,
    #[error("task join error: {0}")]
    Join(String),
}

impl From<std::io::Error> for StrategyError {
    fn from(err: std::io::Error) -> Self {
        StrategyError::Io(err.to_string())
    }
}
