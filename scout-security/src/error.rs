//! Error types for the scan engine.

use thiserror::Error;

/// Errors from scanner adapters and the orchestrator.
///
/// Only `InvalidRequest` ever reaches the original caller; every per-adapter
/// error is caught at the orchestrator boundary and normalized into the
/// summary (a failure entry, an omission, or a skipped line).
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scanner '{scanner}' failed: {message}")]
    ScannerFailed { scanner: String, message: String },
    #[error("scanner '{0}' not found")]
    ScannerNotFound(String),
    #[error("scanner '{0}' is not available")]
    ScannerUnavailable(String),
    #[error("scan timed out after {0}s")]
    Timeout(u64),
    #[error("scanner '{scanner}' produced unparseable output: {message}")]
    Parse { scanner: String, message: String },
    #[error("invalid scan request: {0}")]
    InvalidRequest(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ScanError {
    /// Whether this error was caused by timeout expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ScanError::Timeout(_))
    }
}

impl From<scout_runner::RunnerError> for ScanError {
    fn from(err: scout_runner::RunnerError) -> Self {
        match err {
            scout_runner::RunnerError::Timeout { timeout_secs, .. } => {
                ScanError::Timeout(timeout_secs)
            }
            scout_runner::RunnerError::Spawn { program, source } => ScanError::ScannerFailed {
                scanner: program,
                message: format!("failed to spawn: {source}"),
            },
            scout_runner::RunnerError::Io(e) => ScanError::Io(e),
        }
    }
}
