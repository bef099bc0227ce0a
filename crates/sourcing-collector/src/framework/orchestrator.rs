// Ingestion orchestrator
//
// Drives every candidate of a run through
// fetch -> validate -> hash -> dedup check -> store -> register -> notify,
// with up to `concurrency` candidates in flight. A candidate failure is
// recorded in the result and never aborts the run.

use futures::future;
use futures::stream::{self, StreamExt};
use sourcing_common::ContentDigest;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use super::context::{RunContext, RunState};
use super::policy::CollectorPolicy;
use super::retry::RetryPolicy;
use super::types::{
    Candidate, CandidateError, CandidateOutcome, CollectionResult, ErrorKind, RunOptions,
};
use crate::dedup::{DedupIndex, DedupKey, DedupRecord, DEFAULT_HASH_TTL};
use crate::error::{FetchError, RunError, StoreError};
use crate::notify::{NotificationEvent, Notifier};
use crate::storage::{ObjectStore, ObjectTags, PutReceipt};

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Candidates processed at once
    pub concurrency: usize,
    /// Per fetch attempt
    pub fetch_timeout: Duration,
    /// Per store attempt
    pub store_timeout: Duration,
    pub retry: RetryPolicy,
    /// Lifetime of a dedup key
    pub hash_ttl: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            retry: RetryPolicy::default(),
            hash_ttl: DEFAULT_HASH_TTL,
        }
    }
}

/// Payload of one candidate between fetch and store
struct ContentRecord<'a> {
    candidate: &'a Candidate,
    content: Vec<u8>,
    digest: ContentDigest,
}

pub struct Orchestrator {
    dedup: Arc<dyn DedupIndex>,
    store: ObjectStore,
    notifier: Arc<dyn Notifier>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        dedup: Arc<dyn DedupIndex>,
        store: ObjectStore,
        notifier: Arc<dyn Notifier>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            dedup,
            store,
            notifier,
            settings,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Execute one run of `policy`.
    ///
    /// Fails only when the dedup index is unreachable at start or candidate
    /// generation errors. Once `cancel` fires no further candidate is started;
    /// those already in flight finish and the partial result is returned.
    pub async fn run<P>(
        &self,
        policy: &P,
        ctx: &RunContext,
        options: RunOptions,
        cancel: &CancellationToken,
    ) -> Result<CollectionResult, RunError>
    where
        P: CollectorPolicy + ?Sized,
    {
        self.run_inner(policy, ctx, options, cancel)
            .instrument(ctx.span.clone())
            .await
    }

    async fn run_inner<P>(
        &self,
        policy: &P,
        ctx: &RunContext,
        options: RunOptions,
        cancel: &CancellationToken,
    ) -> Result<CollectionResult, RunError>
    where
        P: CollectorPolicy + ?Sized,
    {
        let mut state = RunState::Idle;
        let mut result = CollectionResult::new(
            ctx.run_id,
            ctx.feed_group.clone(),
            ctx.environment,
            ctx.started_at,
        );

        if let Err(e) = self.dedup.ping().await {
            transition(&mut state, RunState::Failed);
            error!(error = %e, "Dedup index health check failed");
            return Err(RunError::DedupIndexUnavailable(e));
        }

        transition(&mut state, RunState::Generating);
        let candidates = match policy.generate_candidates(ctx).await {
            Ok(candidates) => candidates,
            Err(e) => {
                transition(&mut state, RunState::Failed);
                error!(error = %format!("{e:#}"), "Candidate generation failed");
                return Err(RunError::CandidateGeneration(e));
            }
        };
        let generated = candidates.len();

        transition(&mut state, RunState::Processing);
        info!(
            candidates = generated,
            concurrency = self.settings.concurrency,
            force = options.force,
            "Processing candidates"
        );

        let mut outcomes = stream::iter(candidates)
            .take_while(|_| future::ready(!cancel.is_cancelled()))
            .map(|candidate| self.process_candidate(policy, ctx, candidate, options))
            .buffer_unordered(self.settings.concurrency.max(1));

        while let Some(outcome) = outcomes.next().await {
            result.record(outcome);
        }

        transition(&mut state, RunState::Finalizing);
        if result.total_candidates < generated {
            result.cancelled = true;
            warn!(
                started = result.total_candidates,
                generated, "Run cancelled before every candidate was started"
            );
        }

        if !result.is_consistent() {
            error!(
                total = result.total_candidates,
                collected = result.collected,
                skipped_duplicate = result.skipped_duplicate,
                failed = result.failed,
                "Run counts do not add up"
            );
        }
        debug_assert!(result.is_consistent(), "inconsistent run counts: {result:?}");

        result.completed_at = Some(chrono::Utc::now());
        info!(
            total = result.total_candidates,
            collected = result.collected,
            skipped_duplicate = result.skipped_duplicate,
            failed = result.failed,
            cancelled = result.cancelled,
            duration_secs = result.duration_secs().unwrap_or_default(),
            "Run complete"
        );
        transition(&mut state, RunState::Done);

        Ok(result)
    }

    async fn process_candidate<P>(
        &self,
        policy: &P,
        ctx: &RunContext,
        candidate: Candidate,
        options: RunOptions,
    ) -> CandidateOutcome
    where
        P: CollectorPolicy + ?Sized,
    {
        let span = ctx.candidate_span(&candidate.identifier);
        let outcome = self
            .pipeline(policy, ctx, &candidate, options)
            .instrument(span.clone())
            .await;

        span.in_scope(|| match &outcome {
            CandidateOutcome::Collected { storage_path } => {
                info!(storage_path = %storage_path, "Collected");
            }
            CandidateOutcome::SkippedDuplicate => info!("Skipped duplicate content"),
            CandidateOutcome::Failed(failure) => {
                warn!(kind = %failure.kind, error = %failure.message, "Candidate failed");
            }
        });
        outcome
    }

    async fn pipeline<P>(
        &self,
        policy: &P,
        ctx: &RunContext,
        candidate: &Candidate,
        options: RunOptions,
    ) -> CandidateOutcome
    where
        P: CollectorPolicy + ?Sized,
    {
        let content = match self.fetch(policy, ctx, candidate).await {
            Ok(content) => content,
            Err(e) => return failed(candidate, ErrorKind::FetchError, &e),
        };

        if !policy.validate_content(&content, candidate, ctx) {
            return failed(
                candidate,
                ErrorKind::ValidationError,
                &format!("policy rejected {} byte payload", content.len()),
            );
        }

        let digest = ContentDigest::of(&content);
        let record = ContentRecord {
            candidate,
            content,
            digest,
        };
        let key = DedupKey::new(&ctx.feed_group, ctx.environment, &record.digest);
        debug!(digest = %record.digest.short(), bytes = record.content.len(), "Hashed payload");

        if !options.force {
            match self.dedup.exists(&key).await {
                Ok(true) => return CandidateOutcome::SkippedDuplicate,
                Ok(false) => {}
                Err(e) => return failed(candidate, ErrorKind::DedupIndexError, &e),
            }
        }

        let receipt = match self.store(ctx, &record).await {
            Ok(receipt) => receipt,
            Err(e) => return failed(candidate, ErrorKind::StorageError, &e),
        };

        let dedup_record = DedupRecord {
            storage_path: receipt.location.clone(),
            registered_at: chrono::Utc::now(),
            version: receipt.version.clone(),
            etag: receipt.etag.clone(),
            metadata: candidate.metadata.clone(),
        };
        if let Err(e) = self
            .dedup
            .record(&key, &dedup_record, self.settings.hash_ttl)
            .await
        {
            warn!(error = %e, key = %key, "Stored payload but failed to register its digest");
        }

        let event = NotificationEvent {
            identifier: candidate.identifier.clone(),
            feed_group: ctx.feed_group.clone(),
            environment: ctx.environment,
            storage_path: receipt.location.clone(),
            content_digest: record.digest.clone(),
            collected_at: dedup_record.registered_at,
            version: receipt.version.clone(),
            etag: receipt.etag.clone(),
            original_size: receipt.original_size,
            source_location: candidate.source_location.clone(),
            metadata: candidate.metadata.clone(),
        };
        if let Err(e) = self.notifier.publish(&event).await {
            warn!(error = %e, "Failed to publish collection event");
        }

        CandidateOutcome::Collected {
            storage_path: receipt.location,
        }
    }

    async fn fetch<P>(
        &self,
        policy: &P,
        ctx: &RunContext,
        candidate: &Candidate,
    ) -> Result<Vec<u8>, FetchError>
    where
        P: CollectorPolicy + ?Sized,
    {
        let timeout = self.settings.fetch_timeout;
        self.settings
            .retry
            .run("fetch", FetchError::is_transient, |attempt| async move {
                debug!(attempt, source = %candidate.source_location, "Fetching");
                tokio::time::timeout(timeout, policy.collect_content(candidate, ctx))
                    .await
                    .unwrap_or(Err(FetchError::Timeout(timeout)))
            })
            .await
    }

    async fn store(&self, ctx: &RunContext, record: &ContentRecord<'_>) -> Result<PutReceipt, StoreError> {
        let timeout = self.settings.store_timeout;
        let path = self
            .store
            .partition_path(&ctx.feed_group, ctx.environment, record.candidate);
        let tags = ObjectTags::for_content(&record.digest, &record.candidate.metadata);

        self.settings
            .retry
            .run("store", StoreError::is_transient, |attempt| {
                let path = &path;
                let tags = &tags;
                async move {
                    debug!(attempt, path = %path, "Storing");
                    tokio::time::timeout(timeout, self.store.put(path, &record.content, tags))
                        .await
                        .unwrap_or(Err(StoreError::Timeout(timeout)))
                }
            })
            .await
    }
}

fn transition(state: &mut RunState, next: RunState) {
    debug!(from = %state, to = %next, "Run state");
    *state = next;
}

fn failed(candidate: &Candidate, kind: ErrorKind, error: &dyn std::fmt::Display) -> CandidateOutcome {
    CandidateOutcome::Failed(CandidateError {
        identifier: candidate.identifier.clone(),
        kind,
        message: error.to_string(),
    })
}
