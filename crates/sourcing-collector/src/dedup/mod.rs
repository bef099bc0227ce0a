//! Content-hash dedup index
//!
//! Answers "have we already stored these exact bytes for this feed group and
//! environment?" Keys expire after a TTL, after which identical content is
//! collected again.

mod memory;
mod postgres;

pub use memory::MemoryDedupIndex;
pub use postgres::PgDedupIndex;

use crate::error::DedupError;
use crate::framework::ScalarValue;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sourcing_common::{ContentDigest, Environment};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Default retention for dedup keys
pub const DEFAULT_HASH_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// `{feed_group}:{environment}:{digest}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn new(feed_group: &str, environment: Environment, digest: &ContentDigest) -> Self {
        Self(format!("{}{}", Self::prefix(feed_group, environment), digest))
    }

    /// Key prefix shared by every digest of one feed group and environment
    pub fn prefix(feed_group: &str, environment: Environment) -> String {
        format!("{feed_group}:{environment}:")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the index remembers about a stored payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupRecord {
    pub storage_path: String,
    pub registered_at: DateTime<Utc>,
    pub version: Option<String>,
    pub etag: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, ScalarValue>,
}

#[async_trait]
pub trait DedupIndex: Send + Sync {
    /// Health check run before a run generates any candidates
    async fn ping(&self) -> Result<(), DedupError>;

    /// Whether an unexpired entry exists for `key`
    async fn exists(&self, key: &DedupKey) -> Result<bool, DedupError>;

    /// Insert or replace the entry for `key`, expiring after `ttl`
    async fn record(&self, key: &DedupKey, record: &DedupRecord, ttl: Duration) -> Result<(), DedupError>;

    async fn get(&self, key: &DedupKey) -> Result<Option<DedupRecord>, DedupError>;

    /// Returns true if an entry was removed
    async fn delete(&self, key: &DedupKey) -> Result<bool, DedupError>;

    /// Unexpired entries for one feed group and environment
    async fn count(&self, feed_group: &str, environment: Environment) -> Result<u64, DedupError>;
}

/// Open a dedup index from a URL: `postgres://...`, `postgresql://...` or `memory://`
///
/// Postgres indexes are migrated and swept of expired keys before use.
pub async fn connect(url: &str) -> Result<Arc<dyn DedupIndex>, DedupError> {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        let index = PgDedupIndex::connect(url).await?;
        index.migrate().await?;
        index.purge_expired().await?;
        Ok(Arc::new(index))
    } else if url.starts_with("memory://") {
        Ok(Arc::new(MemoryDedupIndex::new()))
    } else {
        Err(DedupError::UnsupportedUrl(url.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        let digest = ContentDigest::of(b"hello world");
        let key = DedupKey::new("miso_binding_constraints", Environment::Prod, &digest);
        assert_eq!(
            key.as_str(),
            "miso_binding_constraints:prod:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert!(key
            .as_str()
            .starts_with(&DedupKey::prefix("miso_binding_constraints", Environment::Prod)));
    }

    #[test]
    fn test_environments_do_not_share_keys() {
        let digest = ContentDigest::of(b"payload");
        assert_ne!(
            DedupKey::new("feed", Environment::Dev, &digest),
            DedupKey::new("feed", Environment::Prod, &digest)
        );
    }

    #[tokio::test]
    async fn test_connect_rejects_unknown_scheme() {
        let err = connect("redis://localhost:6379").await.err().unwrap();
        assert!(matches!(err, DedupError::UnsupportedUrl(_)));
    }

    #[tokio::test]
    async fn test_connect_memory() {
        let index = connect("memory://").await.unwrap();
        index.ping().await.unwrap();
        assert_eq!(index.count("feed", Environment::Dev).await.unwrap(), 0);
    }
}
