//! In-memory backend used by tests and dry runs

use super::{BackendReceipt, ObjectAttributes, ObjectBackend, ObjectTags};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// One object as the backend received it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
    pub content_encoding: Option<String>,
    pub tags: ObjectTags,
    pub version: String,
    pub etag: String,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: Mutex<HashMap<String, StoredObject>>,
    writes: AtomicUsize,
    next_version: AtomicU64,
    /// Upcoming writes that fail with a transient error
    failing_writes: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` writes fail with a transient write error
    pub fn fail_next_writes(&self, n: usize) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    /// Successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn take_failure(&self) -> bool {
        self.failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        attributes: &ObjectAttributes,
    ) -> Result<BackendReceipt, StoreError> {
        let location = format!("memory://{key}");
        if self.take_failure() {
            return Err(StoreError::Write {
                location,
                message: "injected write failure".to_string(),
            });
        }

        let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        let object = StoredObject {
            etag: format!("{:x}", md5::compute(&body)),
            version: version.to_string(),
            body,
            content_type: attributes.content_type.clone(),
            content_encoding: attributes.content_encoding.clone(),
            tags: attributes.tags.clone(),
        };
        let receipt = BackendReceipt {
            location,
            version: Some(object.version.clone()),
            etag: Some(object.etag.clone()),
        };

        self.objects.lock().await.insert(key.to_string(), object);
        self.writes.fetch_add(1, Ordering::SeqCst);

        Ok(receipt)
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .lock()
            .await
            .get(key)
            .map(|object| object.body.clone())
            .ok_or_else(|| StoreError::NotFound(format!("memory://{key}")))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.objects.lock().await.contains_key(key))
    }
}
