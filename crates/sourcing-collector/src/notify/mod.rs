//! Best-effort completion events for downstream consumers
//!
//! Publishing happens after a payload is durably stored and registered. A
//! failed publish is logged by the orchestrator and never changes run counts.

mod webhook;

pub use webhook::WebhookNotifier;

use crate::error::NotifyError;
use crate::framework::ScalarValue;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sourcing_common::{ContentDigest, Environment};
use std::collections::BTreeMap;

/// Emitted once per collected candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub identifier: String,
    pub feed_group: String,
    pub environment: Environment,
    pub storage_path: String,
    pub content_digest: ContentDigest,
    pub collected_at: DateTime<Utc>,
    pub version: Option<String>,
    pub etag: Option<String>,
    pub original_size: usize,
    pub source_location: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, ScalarValue>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, event: &NotificationEvent) -> Result<(), NotifyError>;
}

/// Used when no notification endpoint is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn publish(&self, _event: &NotificationEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}
