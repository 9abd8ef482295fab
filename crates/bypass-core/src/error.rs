//! Core error types.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// IO error (e.g., reading a direct-domain file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Site-statistics provider failure.
    #[error("Site statistics error: {0}")]
    SiteStat(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
