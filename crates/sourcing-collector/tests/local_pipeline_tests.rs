//! Full runs with the HTTP snapshot policy, local storage and a webhook

mod common;

use common::init_test_tracing;
use serde_json::json;
use sourcing_collector::dedup::MemoryDedupIndex;
use sourcing_collector::feeds::{HttpSnapshotConfig, HttpSnapshotPolicy};
use sourcing_collector::framework::{
    Orchestrator, OrchestratorSettings, RetryPolicy, RunContext, RunOptions,
};
use sourcing_collector::notify::WebhookNotifier;
use sourcing_collector::storage::{LocalBackend, ObjectStore, StoragePath};
use sourcing_common::compression::gunzip;
use sourcing_common::Environment;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SNAPSHOT: &str = r#"{"RefId":"X","Constraint":[]}"#;

fn settings() -> OrchestratorSettings {
    OrchestratorSettings {
        retry: RetryPolicy::new(2, Duration::from_millis(10)),
        ..OrchestratorSettings::default()
    }
}

#[tokio::test]
async fn test_snapshot_lands_on_disk_and_is_announced() {
    init_test_tracing();
    let source = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/binding-constraints"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SNAPSHOT))
        .expect(2)
        .mount(&source)
        .await;

    let sink = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&sink)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(LocalBackend::new(dir.path()));
    let store = ObjectStore::new(backend.clone(), "raw");
    let notifier =
        WebhookNotifier::new(format!("{}/events", sink.uri()), Duration::from_secs(5)).unwrap();
    let orchestrator = Orchestrator::new(
        Arc::new(MemoryDedupIndex::new()),
        store.clone(),
        Arc::new(notifier),
        settings(),
    );

    let mut config = HttpSnapshotConfig::new(format!("{}/binding-constraints", source.uri()));
    config.expect_json = true;
    let policy = HttpSnapshotPolicy::new(config).unwrap();
    let cancel = CancellationToken::new();

    let ctx = RunContext::new("miso_binding_constraints", Environment::Staging);
    let first = orchestrator
        .run(&policy, &ctx, RunOptions::default(), &cancel)
        .await
        .unwrap();
    assert_eq!(first.collected, 1);
    assert!(!first.has_failures());

    // Same bytes on the next run: fetched again, stored once
    let ctx = RunContext::new("miso_binding_constraints", Environment::Staging);
    let second = orchestrator
        .run(&policy, &ctx, RunOptions::default(), &cancel)
        .await
        .unwrap();
    assert_eq!(second.skipped_duplicate, 1);

    let date = first.started_at.date_naive();
    let identifier = format!(
        "miso_binding_constraints_{}.json",
        first.started_at.format("%Y%m%d_%H%M")
    );
    let key = format!(
        "raw/miso_binding_constraints/staging/{}/{}",
        date.format("%Y/%m/%d"),
        identifier
    );

    let on_disk = std::fs::read(dir.path().join(&key)).unwrap();
    assert_eq!(gunzip(&on_disk).unwrap(), SNAPSHOT.as_bytes());
    assert_eq!(store.get(&StoragePath::new(key.clone())).await.unwrap(), SNAPSHOT.as_bytes());

    let meta = backend.metadata(&key).await.unwrap();
    assert_eq!(meta.content_encoding.as_deref(), Some("gzip"));
    assert_eq!(meta.content_type, "application/json");
    assert_eq!(meta.etag, format!("{:x}", md5::compute(&on_disk)));
    assert!(meta.tags.contains_key("content_digest"));
}

#[tokio::test]
async fn test_summary_serializes_for_stdout() {
    init_test_tracing();
    let source = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>down</html>"))
        .mount(&source)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(
        Arc::new(MemoryDedupIndex::new()),
        ObjectStore::new(Arc::new(LocalBackend::new(dir.path())), ""),
        Arc::new(sourcing_collector::notify::NoopNotifier),
        settings(),
    );
    let mut config = HttpSnapshotConfig::new(source.uri());
    config.expect_json = true;
    let policy = HttpSnapshotPolicy::new(config).unwrap();

    let ctx = RunContext::new("feed", Environment::Dev);
    let result = orchestrator
        .run(&policy, &ctx, RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    let summary = serde_json::to_value(&result).unwrap();
    assert_eq!(summary["total_candidates"], 1);
    assert_eq!(summary["collected"], 0);
    assert_eq!(summary["skipped_duplicate"], 0);
    assert_eq!(summary["failed"], 1);
    assert_eq!(summary["errors"][0]["kind"], json!("ValidationError"));
    assert_eq!(summary["feed_group"], "feed");
    assert_eq!(summary["run_id"], json!(ctx.run_id.to_string()));
}
