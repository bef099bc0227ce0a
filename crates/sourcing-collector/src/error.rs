//! Error types for the collector
//!
//! Component errors (`FetchError`, `StoreError`, `DedupError`, `NotifyError`)
//! never escape a single candidate: the orchestrator converts them into a
//! recorded [`ErrorKind`](crate::framework::ErrorKind). Only [`RunError`] aborts
//! a run.

use std::time::Duration;
use thiserror::Error;

/// Failure while fetching a candidate's raw bytes
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Whether another attempt could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Transport { .. } | FetchError::Timeout(_) => true,
            FetchError::Other(_) => false,
        }
    }
}

/// Failure while writing or reading the object store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to write {location}: {message}")]
    Write { location: String, message: String },

    #[error("Failed to read {location}: {message}")]
    Read { location: String, message: String },

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key '{key}': {message}")]
    InvalidKey { key: String, message: String },

    #[error("Storage call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Payload encoding error: {0}")]
    Encoding(#[from] sourcing_common::SourcingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Write { .. } | StoreError::Read { .. } | StoreError::Timeout(_) | StoreError::Io(_)
        )
    }
}

/// Failure talking to the dedup index
#[derive(Error, Debug)]
pub enum DedupError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Unsupported dedup index URL '{0}'. Expected postgres://... or memory://")]
    UnsupportedUrl(String),
}

/// Failure publishing a completion event. Logged, never counted.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notification endpoint returned HTTP {0}")]
    Status(u16),
}

/// Invalid collector configuration, reported before anything connects
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

/// Errors that abort a whole run
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Dedup index unavailable: {0}")]
    DedupIndexUnavailable(#[source] DedupError),

    #[error("Candidate generation failed: {0:#}")]
    CandidateGeneration(#[source] anyhow::Error),
}
