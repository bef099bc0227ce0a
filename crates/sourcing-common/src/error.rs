//! Error types shared across the sourcing workspace

use thiserror::Error;

/// Result type alias for shared helpers
pub type Result<T> = std::result::Result<T, SourcingError>;

/// Main error type for shared helpers
#[derive(Error, Debug)]
pub enum SourcingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Invalid environment '{0}'. Must be one of: dev, staging, prod")]
    InvalidEnvironment(String),
}
