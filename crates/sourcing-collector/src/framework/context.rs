//! Per-run context handed to the orchestrator and every policy call

use chrono::{DateTime, Utc};
use sourcing_common::Environment;
use tracing::{info_span, Span};
use uuid::Uuid;

/// Identity of one run plus the span all of its log lines hang off
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub feed_group: String,
    pub environment: Environment,
    pub started_at: DateTime<Utc>,
    pub span: Span,
}

impl RunContext {
    pub fn new(feed_group: impl Into<String>, environment: Environment) -> Self {
        let run_id = Uuid::new_v4();
        let feed_group = feed_group.into();
        let span = info_span!(
            "collection_run",
            run_id = %run_id,
            feed_group = %feed_group,
            environment = %environment,
        );

        Self {
            run_id,
            feed_group,
            environment,
            started_at: Utc::now(),
            span,
        }
    }

    /// Child span for one candidate, parented to the run span
    pub fn candidate_span(&self, identifier: &str) -> Span {
        info_span!(parent: &self.span, "candidate", candidate = %identifier)
    }
}

/// Lifecycle of a run. `Failed` is terminal and only reached before any
/// candidate is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Generating,
    Processing,
    Finalizing,
    Done,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Generating => "generating",
            RunState::Processing => "processing",
            RunState::Finalizing => "finalizing",
            RunState::Done => "done",
            RunState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
