//! Shared fixtures for collector integration tests
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use chrono::NaiveDate;
use sourcing_collector::dedup::{DedupIndex, DedupKey, DedupRecord, MemoryDedupIndex};
use sourcing_collector::error::{DedupError, FetchError, NotifyError};
use sourcing_collector::framework::{
    Candidate, CollectorPolicy, Orchestrator, OrchestratorSettings, RetryPolicy, RunContext,
};
use sourcing_collector::notify::{NotificationEvent, Notifier};
use sourcing_collector::storage::{MemoryBackend, ObjectStore};
use sourcing_common::Environment;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const FEED: &str = "miso_binding_constraints";

pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sourcing_collector=debug")),
        )
        .with_test_writer()
        .try_init();
}

pub fn candidate(identifier: &str) -> Candidate {
    Candidate::new(
        identifier,
        format!("https://api.test/{identifier}"),
        NaiveDate::from_ymd_opt(2025, 1, 20).unwrap(),
    )
    .with_metadata("source", "miso")
}

/// How the scripted policy answers a fetch
#[derive(Debug, Clone)]
pub enum Fetch {
    Body(Vec<u8>),
    /// Transient 503 for the first `n` attempts, then the body
    FailThen(usize, Vec<u8>),
    /// Permanent 404
    NotFound,
    /// Never completes
    Hang,
}

/// Policy driven by a fixed script, counting calls
#[derive(Default)]
pub struct ScriptedPolicy {
    candidates: Vec<Candidate>,
    script: HashMap<String, Fetch>,
    generation_error: Option<String>,
    cancel_on_fetch: Option<CancellationToken>,
    pub generate_calls: AtomicUsize,
    pub fetch_calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, identifier: &str, fetch: Fetch) -> Self {
        self.candidates.push(candidate(identifier));
        self.script.insert(identifier.to_string(), fetch);
        self
    }

    pub fn failing_generation(message: &str) -> Self {
        Self {
            generation_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Cancel `token` from inside the first fetch
    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_on_fetch = Some(token);
        self
    }

    pub fn fetches(&self, identifier: &str) -> usize {
        self.fetch_calls
            .lock()
            .unwrap()
            .get(identifier)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl CollectorPolicy for ScriptedPolicy {
    async fn generate_candidates(&self, _ctx: &RunContext) -> anyhow::Result<Vec<Candidate>> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        match &self.generation_error {
            Some(message) => Err(anyhow::anyhow!(message.clone())),
            None => Ok(self.candidates.clone()),
        }
    }

    async fn collect_content(
        &self,
        candidate: &Candidate,
        _ctx: &RunContext,
    ) -> Result<Vec<u8>, FetchError> {
        let attempt = {
            let mut calls = self.fetch_calls.lock().unwrap();
            let count = calls.entry(candidate.identifier.clone()).or_insert(0);
            *count += 1;
            *count
        };

        if let Some(token) = &self.cancel_on_fetch {
            token.cancel();
        }

        match self.script.get(&candidate.identifier) {
            Some(Fetch::Body(body)) => Ok(body.clone()),
            Some(Fetch::FailThen(failures, body)) => {
                if attempt <= *failures {
                    Err(FetchError::Status {
                        url: candidate.source_location.clone(),
                        status: 503,
                    })
                } else {
                    Ok(body.clone())
                }
            }
            Some(Fetch::NotFound) | None => Err(FetchError::Status {
                url: candidate.source_location.clone(),
                status: 404,
            }),
            Some(Fetch::Hang) => {
                tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
                Ok(Vec::new())
            }
        }
    }

    fn validate_content(&self, content: &[u8], _candidate: &Candidate, _ctx: &RunContext) -> bool {
        serde_json::from_slice::<serde_json::Value>(content).is_ok()
    }
}

/// Notifier that remembers events, optionally failing every publish
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<NotificationEvent>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event.clone());
        if self.fail {
            Err(NotifyError::Status(503))
        } else {
            Ok(())
        }
    }
}

/// Dedup index whose calls can be made to fail
#[derive(Default)]
pub struct FaultyDedupIndex {
    inner: MemoryDedupIndex,
    pub ping_fails: bool,
    pub lookups_fail: bool,
    pub records_fail: bool,
}

impl FaultyDedupIndex {
    pub fn failing_ping() -> Self {
        Self {
            ping_fails: true,
            ..Self::default()
        }
    }

    pub fn failing_lookups() -> Self {
        Self {
            lookups_fail: true,
            ..Self::default()
        }
    }

    pub fn failing_records() -> Self {
        Self {
            records_fail: true,
            ..Self::default()
        }
    }
}

fn unavailable() -> DedupError {
    DedupError::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl DedupIndex for FaultyDedupIndex {
    async fn ping(&self) -> Result<(), DedupError> {
        if self.ping_fails {
            return Err(unavailable());
        }
        self.inner.ping().await
    }

    async fn exists(&self, key: &DedupKey) -> Result<bool, DedupError> {
        if self.lookups_fail {
            return Err(unavailable());
        }
        self.inner.exists(key).await
    }

    async fn record(&self, key: &DedupKey, record: &DedupRecord, ttl: Duration) -> Result<(), DedupError> {
        if self.records_fail {
            return Err(unavailable());
        }
        self.inner.record(key, record, ttl).await
    }

    async fn get(&self, key: &DedupKey) -> Result<Option<DedupRecord>, DedupError> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &DedupKey) -> Result<bool, DedupError> {
        self.inner.delete(key).await
    }

    async fn count(&self, feed_group: &str, environment: Environment) -> Result<u64, DedupError> {
        self.inner.count(feed_group, environment).await
    }
}

/// Orchestrator wired to in-memory backends
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub backend: Arc<MemoryBackend>,
    pub dedup: Arc<dyn DedupIndex>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn settings() -> OrchestratorSettings {
    OrchestratorSettings {
        concurrency: 4,
        fetch_timeout: Duration::from_secs(60),
        store_timeout: Duration::from_secs(120),
        retry: RetryPolicy::new(3, Duration::from_millis(500)),
        hash_ttl: Duration::from_secs(365 * 24 * 60 * 60),
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::build(Arc::new(MemoryDedupIndex::new()), RecordingNotifier::default(), settings())
    }

    pub fn build(
        dedup: Arc<dyn DedupIndex>,
        notifier: RecordingNotifier,
        settings: OrchestratorSettings,
    ) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let notifier = Arc::new(notifier);
        let orchestrator = Orchestrator::new(
            dedup.clone(),
            ObjectStore::new(backend.clone(), "raw"),
            notifier.clone(),
            settings,
        );

        Self {
            orchestrator,
            backend,
            dedup,
            notifier,
        }
    }

    pub fn context(&self) -> RunContext {
        RunContext::new(FEED, Environment::Dev)
    }
}
