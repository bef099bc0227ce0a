//! The feed plugin seam
//!
//! A [`CollectorPolicy`] supplies the three feed-specific steps of a run. The
//! orchestrator owns everything else: retries, timeouts, hashing, dedup,
//! storage and notification.

use super::context::RunContext;
use super::types::Candidate;
use crate::error::FetchError;
use async_trait::async_trait;

#[async_trait]
pub trait CollectorPolicy: Send + Sync {
    /// Enumerate this run's work. An error here fails the whole run.
    async fn generate_candidates(&self, ctx: &RunContext) -> anyhow::Result<Vec<Candidate>>;

    /// Fetch raw bytes for one candidate. Called once per attempt; the
    /// orchestrator applies the timeout and retries transient errors.
    async fn collect_content(
        &self,
        candidate: &Candidate,
        ctx: &RunContext,
    ) -> Result<Vec<u8>, FetchError>;

    /// Cheap structural sanity check. Rejected content is never retried.
    fn validate_content(&self, content: &[u8], _candidate: &Candidate, _ctx: &RunContext) -> bool {
        !content.is_empty()
    }
}
