//! Core types for the collection framework

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sourcing_common::Environment;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Scalar value carried in candidate metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl std::fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarValue::Bool(v) => write!(f, "{v}"),
            ScalarValue::Integer(v) => write!(f, "{v}"),
            ScalarValue::Float(v) => write!(f, "{v}"),
            ScalarValue::String(v) => f.write_str(v),
        }
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::String(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::String(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Integer(value)
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::Float(value)
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Bool(value)
    }
}

/// One unit of work for a run.
///
/// `identifier` must be deterministic for a logical snapshot: re-running the
/// same candidate lands on the same storage path and overwrites it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Unique within a run; storage key leaf and log correlation id
    pub identifier: String,
    /// URL or opaque locator handed to the policy's fetch step
    pub source_location: String,
    /// Descriptive tags (data type, source system, logical date, ...)
    pub metadata: BTreeMap<String, ScalarValue>,
    /// Fetch-time parameters owned by the policy (headers, timeout, query)
    pub collection_params: BTreeMap<String, serde_json::Value>,
    /// Calendar date used for storage partitioning
    pub file_date: NaiveDate,
}

impl Candidate {
    pub fn new(
        identifier: impl Into<String>,
        source_location: impl Into<String>,
        file_date: NaiveDate,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            source_location: source_location.into(),
            metadata: BTreeMap::new(),
            collection_params: BTreeMap::new(),
            file_date,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.collection_params.insert(key.into(), value);
        self
    }
}

/// Classification of a failed candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    FetchError,
    ValidationError,
    StorageError,
    DedupIndexError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::FetchError => "FetchError",
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::StorageError => "StorageError",
            ErrorKind::DedupIndexError => "DedupIndexError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed candidate in the run summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateError {
    pub identifier: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Terminal outcome of one candidate's pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateOutcome {
    Collected { storage_path: String },
    SkippedDuplicate,
    Failed(CandidateError),
}

/// Per-run summary returned to the caller.
///
/// `total_candidates == collected + skipped_duplicate + failed` holds for every
/// value this type can be built into through [`CollectionResult::record`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionResult {
    pub run_id: Uuid,
    pub feed_group: String,
    pub environment: Environment,
    pub total_candidates: usize,
    pub collected: usize,
    pub skipped_duplicate: usize,
    pub failed: usize,
    pub errors: Vec<CandidateError>,
    /// Shutdown stopped the run before every generated candidate was started
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CollectionResult {
    pub fn new(
        run_id: Uuid,
        feed_group: impl Into<String>,
        environment: Environment,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id,
            feed_group: feed_group.into(),
            environment,
            total_candidates: 0,
            collected: 0,
            skipped_duplicate: 0,
            failed: 0,
            errors: Vec::new(),
            cancelled: false,
            started_at,
            completed_at: None,
        }
    }

    /// Account for exactly one candidate outcome
    pub fn record(&mut self, outcome: CandidateOutcome) {
        self.total_candidates += 1;
        match outcome {
            CandidateOutcome::Collected { .. } => self.collected += 1,
            CandidateOutcome::SkippedDuplicate => self.skipped_duplicate += 1,
            CandidateOutcome::Failed(error) => {
                self.failed += 1;
                self.errors.push(error);
            }
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.total_candidates == self.collected + self.skipped_duplicate + self.failed
            && self.errors.len() == self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.completed_at
            .map(|done| (done - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

/// Caller-selected switches for a single run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Store every candidate even if its digest is already registered
    pub force: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn result() -> CollectionResult {
        CollectionResult::new(
            Uuid::nil(),
            "miso_binding_constraints",
            Environment::Dev,
            Utc::now(),
        )
    }

    #[test]
    fn test_record_keeps_counts_consistent() {
        let mut summary = result();
        summary.record(CandidateOutcome::Collected {
            storage_path: "a".into(),
        });
        summary.record(CandidateOutcome::SkippedDuplicate);
        summary.record(CandidateOutcome::Failed(CandidateError {
            identifier: "c".into(),
            kind: ErrorKind::ValidationError,
            message: "rejected".into(),
        }));

        assert_eq!(summary.total_candidates, 3);
        assert_eq!(summary.collected, 1);
        assert_eq!(summary.skipped_duplicate, 1);
        assert_eq!(summary.failed, 1);
        assert!(summary.is_consistent());
        assert!(summary.has_failures());
    }

    #[test]
    fn test_summary_serializes_error_kind_by_name() {
        let mut summary = result();
        summary.record(CandidateOutcome::Failed(CandidateError {
            identifier: "x".into(),
            kind: ErrorKind::FetchError,
            message: "timed out".into(),
        }));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["errors"][0]["kind"], "FetchError");
        assert_eq!(json["environment"], "dev");
        assert_eq!(json["total_candidates"], 1);
    }

    #[test]
    fn test_scalar_metadata_display() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
        let candidate = Candidate::new("id", "https://x.test", date)
            .with_metadata("source", "miso")
            .with_metadata("hour", 14i64)
            .with_metadata("is_realtime", true);

        let rendered: Vec<String> = candidate.metadata.values().map(|v| v.to_string()).collect();
        assert_eq!(rendered, vec!["14", "true", "miso"]);
    }
}
