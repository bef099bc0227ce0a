//! Filesystem backend
//!
//! Objects live under a root directory at their key. Write attributes go to a
//! `{key}.meta.json` sidecar next to the body.

use super::{BackendReceipt, ObjectAttributes, ObjectBackend};
use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, instrument};

const SIDECAR_SUFFIX: &str = ".meta.json";

/// Contents of the sidecar file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalObjectMeta {
    pub content_type: String,
    pub content_encoding: Option<String>,
    pub etag: String,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key under the root, refusing anything that would escape it
    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
                message: "must be a relative path without '..'".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }

    fn sidecar(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(SIDECAR_SUFFIX);
        PathBuf::from(name)
    }

    /// Read the sidecar written alongside `key`
    pub async fn metadata(&self, key: &str) -> Result<LocalObjectMeta, StoreError> {
        let path = self.resolve(key)?;
        let raw = tokio::fs::read(Self::sidecar(&path)).await?;
        serde_json::from_slice(&raw).map_err(|e| StoreError::Read {
            location: key.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ObjectBackend for LocalBackend {
    #[instrument(skip(self, body, attributes))]
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        attributes: &ObjectAttributes,
    ) -> Result<BackendReceipt, StoreError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let etag = format!("{:x}", md5::compute(&body));
        let meta = LocalObjectMeta {
            content_type: attributes.content_type.clone(),
            content_encoding: attributes.content_encoding.clone(),
            etag: etag.clone(),
            tags: attributes.tags.to_map(),
        };
        let sidecar = serde_json::to_vec_pretty(&meta).map_err(|e| StoreError::Write {
            location: key.to_string(),
            message: e.to_string(),
        })?;

        tokio::fs::write(&path, &body).await?;
        tokio::fs::write(Self::sidecar(&path), sidecar).await?;

        debug!("Wrote {} bytes to {}", body.len(), path.display());

        Ok(BackendReceipt {
            location: format!("file://{}", path.display()),
            version: None,
            etag: Some(etag),
        })
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.resolve(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}
