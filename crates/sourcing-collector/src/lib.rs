//! Sourcing Collector
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Periodic snapshot ingestion for external market-data APIs. A feed plugs in
//! a [`CollectorPolicy`](framework::CollectorPolicy); the
//! [`Orchestrator`](framework::Orchestrator) turns its candidates into a
//! deduplicated, compressed, date-partitioned set of stored objects and
//! reports a [`CollectionResult`](framework::CollectionResult).
//!
//! # Modules
//!
//! - [`framework`]: candidates, the policy trait, retries and the orchestrator
//! - [`dedup`]: content-hash index (PostgreSQL or in-memory)
//! - [`storage`]: partitioned object store (S3, local filesystem, in-memory)
//! - [`notify`]: completion events (webhook or no-op)
//! - [`feeds`]: the generic HTTP snapshot policy
//! - [`config`] and [`cli`]: validated run configuration
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sourcing_collector::dedup::MemoryDedupIndex;
//! use sourcing_collector::feeds::{HttpSnapshotConfig, HttpSnapshotPolicy};
//! use sourcing_collector::framework::{Orchestrator, OrchestratorSettings, RunContext, RunOptions};
//! use sourcing_collector::notify::NoopNotifier;
//! use sourcing_collector::storage::{LocalBackend, ObjectStore};
//! use sourcing_common::Environment;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let policy = HttpSnapshotPolicy::new(HttpSnapshotConfig::new("https://api.example.com/constraints"))?;
//! let orchestrator = Orchestrator::new(
//!     Arc::new(MemoryDedupIndex::new()),
//!     ObjectStore::new(Arc::new(LocalBackend::new("./data")), "raw"),
//!     Arc::new(NoopNotifier),
//!     OrchestratorSettings::default(),
//! );
//!
//! let ctx = RunContext::new("binding_constraints", Environment::Dev);
//! let result = orchestrator
//!     .run(&policy, &ctx, RunOptions::default(), &CancellationToken::new())
//!     .await?;
//! println!("collected {} of {}", result.collected, result.total_candidates);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod dedup;
pub mod error;
pub mod feeds;
pub mod framework;
pub mod notify;
pub mod storage;

pub use config::CollectorConfig;
pub use error::{ConfigError, DedupError, FetchError, NotifyError, RunError, StoreError};
pub use framework::{CollectionResult, CollectorPolicy, Orchestrator};
