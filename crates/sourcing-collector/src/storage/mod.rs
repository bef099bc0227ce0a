//! Partitioned, gzip-compressed object storage
//!
//! [`ObjectStore`] decides *where* and *how* a payload is written; an
//! [`ObjectBackend`] does the actual I/O. Layout:
//!
//! ```text
//! {prefix}/{feed_group}/{environment}/{yyyy}/{mm}/{dd}/{identifier}
//! ```
//!
//! Bodies are gzip-compressed and carry `Content-Encoding: gzip`.

pub mod config;
mod local;
mod memory;
mod s3;

pub use config::StorageConfig;
pub use local::LocalBackend;
pub use memory::{MemoryBackend, StoredObject};
pub use s3::S3Backend;

use crate::error::StoreError;
use crate::framework::{Candidate, ScalarValue};
use async_trait::async_trait;
use chrono::Datelike;
use sourcing_common::compression::{compression_ratio, gunzip, gzip};
use sourcing_common::{ContentDigest, Environment};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

pub const CONTENT_ENCODING_GZIP: &str = "gzip";

/// Tag key carrying the payload digest
pub const DIGEST_TAG: &str = "content_digest";

/// Object key relative to the backend root
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoragePath(String);

impl StoragePath {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StoragePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered key/value tags attached to a stored object.
///
/// The digest tag always comes first so backends that cap the tag count keep it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectTags(Vec<(String, String)>);

impl ObjectTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_content(digest: &ContentDigest, metadata: &BTreeMap<String, ScalarValue>) -> Self {
        let mut tags = Self::new();
        tags.insert(DIGEST_TAG, digest.as_str());
        for (key, value) in metadata {
            if key != DIGEST_TAG {
                tags.insert(key.clone(), value.to_string());
            }
        }
        tags
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.0.iter().cloned().collect()
    }

    /// `k1=v1&k2=v2`, form-encoded, first `limit` tags only
    pub fn to_query_string(&self, limit: usize) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.0.iter().take(limit) {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }
}

/// Write attributes handed to a backend alongside the body
#[derive(Debug, Clone)]
pub struct ObjectAttributes {
    pub content_type: String,
    pub content_encoding: Option<String>,
    pub tags: ObjectTags,
}

/// What a backend reports back for one write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendReceipt {
    /// Fully qualified location, e.g. `s3://bucket/key` or `file:///root/key`
    pub location: String,
    pub version: Option<String>,
    pub etag: Option<String>,
}

/// Proof of a durable write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutReceipt {
    pub location: String,
    pub version: Option<String>,
    pub etag: Option<String>,
    pub original_size: usize,
    pub compressed_size: usize,
}

#[async_trait]
pub trait ObjectBackend: Send + Sync {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        attributes: &ObjectAttributes,
    ) -> Result<BackendReceipt, StoreError>;

    /// Raw stored bytes (still compressed)
    async fn get_object(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct ObjectStore {
    backend: Arc<dyn ObjectBackend>,
    prefix: String,
}

impl ObjectStore {
    pub fn new(backend: Arc<dyn ObjectBackend>, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into().trim_matches('/').to_string();
        Self { backend, prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Deterministic key for a candidate; the identifier is the literal leaf
    pub fn partition_path(
        &self,
        feed_group: &str,
        environment: Environment,
        candidate: &Candidate,
    ) -> StoragePath {
        let date = candidate.file_date;
        let partition = format!(
            "{}/{}/{:04}/{:02}/{:02}/{}",
            feed_group,
            environment,
            date.year(),
            date.month(),
            date.day(),
            candidate.identifier
        );

        if self.prefix.is_empty() {
            StoragePath(partition)
        } else {
            StoragePath(format!("{}/{}", self.prefix, partition))
        }
    }

    /// Compress and write `content`
    #[instrument(skip_all, fields(path = %path))]
    pub async fn put(
        &self,
        path: &StoragePath,
        content: &[u8],
        tags: &ObjectTags,
    ) -> Result<PutReceipt, StoreError> {
        let compressed = gzip(content)?;
        let compressed_size = compressed.len();

        debug!(
            original_size = content.len(),
            compressed_size,
            ratio = compression_ratio(content.len(), compressed_size),
            "Compressed payload"
        );

        let attributes = ObjectAttributes {
            content_type: content_type_for(path.as_str()).to_string(),
            content_encoding: Some(CONTENT_ENCODING_GZIP.to_string()),
            tags: tags.clone(),
        };

        let receipt = self
            .backend
            .put_object(path.as_str(), compressed, &attributes)
            .await?;

        Ok(PutReceipt {
            location: receipt.location,
            version: receipt.version,
            etag: receipt.etag,
            original_size: content.len(),
            compressed_size,
        })
    }

    /// Read back and decompress a stored payload
    #[instrument(skip_all, fields(path = %path))]
    pub async fn get(&self, path: &StoragePath) -> Result<Vec<u8>, StoreError> {
        let compressed = self.backend.get_object(path.as_str()).await?;
        Ok(gunzip(&compressed)?)
    }

    pub async fn exists(&self, path: &StoragePath) -> Result<bool, StoreError> {
        self.backend.exists(path.as_str()).await
    }
}

fn content_type_for(key: &str) -> &'static str {
    let extension = key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("json") => "application/json",
        Some("csv") => "text/csv",
        Some("xml") => "application/xml",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn candidate() -> Candidate {
        Candidate::new(
            "miso_binding_constraints_20250105_0930.json",
            "https://api.test/constraints",
            NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
        )
    }

    #[test]
    fn test_partition_path_with_prefix() {
        let store = ObjectStore::new(Arc::new(MemoryBackend::new()), "/raw/");
        let path = store.partition_path("miso_binding_constraints", Environment::Prod, &candidate());
        assert_eq!(
            path.as_str(),
            "raw/miso_binding_constraints/prod/2025/01/05/miso_binding_constraints_20250105_0930.json"
        );
    }

    #[test]
    fn test_partition_path_without_prefix() {
        let store = ObjectStore::new(Arc::new(MemoryBackend::new()), "");
        let path = store.partition_path("feed", Environment::Dev, &candidate());
        assert!(path.as_str().starts_with("feed/dev/2025/01/05/"));
    }

    #[test]
    fn test_tags_put_digest_first() {
        let digest = ContentDigest::of(b"x");
        let mut metadata = BTreeMap::new();
        metadata.insert("aaa".to_string(), ScalarValue::from("first alphabetically"));
        metadata.insert("hour".to_string(), ScalarValue::from(9i64));

        let tags = ObjectTags::for_content(&digest, &metadata);
        assert_eq!(tags.iter().next().unwrap().0, DIGEST_TAG);
        assert_eq!(tags.get("hour"), Some("9"));
        assert_eq!(tags.len(), 3);
    }

    #[test]
    fn test_tag_query_string_is_encoded_and_capped() {
        let mut tags = ObjectTags::new();
        tags.insert("source", "MISO RT");
        tags.insert("note", "a&b=c");
        tags.insert("dropped", "x");

        assert_eq!(tags.to_query_string(2), "source=MISO+RT&note=a%26b%3Dc");
    }

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(content_type_for("a/b/file.JSON"), "application/json");
        assert_eq!(content_type_for("a/b/file"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_put_then_get_round_trips() {
        let backend = Arc::new(MemoryBackend::new());
        let store = ObjectStore::new(backend.clone(), "raw");
        let path = store.partition_path("feed", Environment::Dev, &candidate());
        let body = br#"{"RefId":"X","Constraint":[]}"#;

        let receipt = store.put(&path, body, &ObjectTags::new()).await.unwrap();
        assert_eq!(receipt.original_size, body.len());
        assert!(receipt.etag.is_some());

        let stored = backend.object(path.as_str()).await.unwrap();
        assert_eq!(stored.content_encoding.as_deref(), Some("gzip"));
        assert_eq!(stored.content_type, "application/json");
        assert_ne!(stored.body, body.to_vec());

        assert_eq!(store.get(&path).await.unwrap(), body.to_vec());
        assert!(store.exists(&path).await.unwrap());
    }
}
