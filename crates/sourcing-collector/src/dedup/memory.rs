//! In-process dedup index for tests and single-shot local runs

use super::{DedupIndex, DedupKey, DedupRecord};
use crate::error::DedupError;
use async_trait::async_trait;
use sourcing_common::Environment;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    record: DedupRecord,
    /// `None` when the TTL reaches past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires_at| now < expires_at)
    }
}

#[derive(Debug, Default)]
pub struct MemoryDedupIndex {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryDedupIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DedupIndex for MemoryDedupIndex {
    async fn ping(&self) -> Result<(), DedupError> {
        Ok(())
    }

    async fn exists(&self, key: &DedupKey) -> Result<bool, DedupError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn record(&self, key: &DedupKey, record: &DedupRecord, ttl: Duration) -> Result<(), DedupError> {
        let entry = Entry {
            record: record.clone(),
            expires_at: Instant::now().checked_add(ttl),
        };
        self.entries.lock().await.insert(key.as_str().to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &DedupKey) -> Result<Option<DedupRecord>, DedupError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        match entries.get(key.as_str()) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.record.clone())),
            Some(_) => {
                entries.remove(key.as_str());
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &DedupKey) -> Result<bool, DedupError> {
        let now = Instant::now();
        let removed = self.entries.lock().await.remove(key.as_str());
        Ok(removed.is_some_and(|entry| entry.is_live(now)))
    }

    async fn count(&self, feed_group: &str, environment: Environment) -> Result<u64, DedupError> {
        let prefix = DedupKey::prefix(feed_group, environment);
        let now = Instant::now();
        let entries = self.entries.lock().await;
        let live = entries
            .iter()
            .filter(|(key, entry)| key.starts_with(&prefix) && entry.is_live(now))
            .count();
        Ok(live as u64)
    }
}
