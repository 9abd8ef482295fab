//! Error types for the PAC subsystem.

use thiserror::Error;

/// PAC subsystem error type.
#[derive(Debug, Error)]
pub enum PacError {
    /// The PAC template could not be compiled. Fatal at startup.
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// Rendering a document failed. Aborts only the current request.
    #[error("Render error: {0}")]
    Render(String),

    /// The proxy address for a connection could not be derived.
    #[error("Address derivation error: {0}")]
    AddressDerivation(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for PAC operations.
pub type Result<T> = std::result::Result<T, PacError>;
