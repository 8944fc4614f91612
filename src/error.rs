//! Error types for relay operations.
//!
//! Internal code uses `anyhow::Result` with context; `RelayError` is the
//! typed boundary the library exposes to callers.

use thiserror::Error;

/// Error type surfaced by the public API
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
    /// Browser/tab error
    #[error("Automation error: {0}")]
    Automation(String),
    /// Resource registry (REST backend) error
    #[error("Registry error: {0}")]
    Registry(String),
    /// Worker protocol error (explicit failure or timeout)
    #[error("Worker error: {0}")]
    Worker(String),
    /// Other errors
    #[error("Relay error: {0}")]
    Other(String),
}

impl From<anyhow::Error> for RelayError {
    fn from(err: anyhow::Error) -> Self {
        // Use {:#} to preserve full error chain with context
        Self::Other(format!("{err:#}"))
    }
}

/// Convenience alias for Result with `RelayError`
pub type RelayResult<T> = Result<T, RelayError>;
