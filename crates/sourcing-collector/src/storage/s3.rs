use super::config::StorageConfig;
use super::{BackendReceipt, ObjectAttributes, ObjectBackend};
use crate::error::StoreError;
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    Client,
};
use tracing::{debug, info, instrument, warn};

/// S3 refuses more than 10 tags per object
pub const MAX_S3_TAGS: usize = 10;

#[derive(Clone)]
pub struct S3Backend {
    client: Client,
    bucket: String,
}

impl S3Backend {
    pub async fn new(config: StorageConfig) -> anyhow::Result<Self> {
        config.validate()?;
        debug!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint,
            "Initializing S3 backend"
        );

        let mut builder = match config.static_credentials() {
            Some((access_key, secret_key)) => {
                let credentials =
                    Credentials::new(access_key, secret_key, None, None, "sourcing-collector");
                aws_sdk_s3::Config::builder()
                    .behavior_version(aws_config::BehaviorVersion::latest())
                    .credentials_provider(credentials)
                    .region(Region::new(config.region.clone()))
            }
            None => {
                let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
                    .region(Region::new(config.region.clone()))
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            }
        }
        .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.build());

        info!("S3 backend initialized for bucket: {}", config.bucket);

        Ok(Self {
            client,
            bucket: config.bucket,
        })
    }

    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

#[async_trait]
impl ObjectBackend for S3Backend {
    #[instrument(skip(self, body, attributes), fields(bucket = %self.bucket))]
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        attributes: &ObjectAttributes,
    ) -> Result<BackendReceipt, StoreError> {
        let location = self.location(key);

        if attributes.tags.len() > MAX_S3_TAGS {
            warn!(
                tags = attributes.tags.len(),
                kept = MAX_S3_TAGS,
                "Dropping object tags beyond the S3 limit"
            );
        }

        debug!("Uploading {} bytes to {}", body.len(), location);

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(&attributes.content_type)
            .body(ByteStream::from(body));

        if let Some(encoding) = &attributes.content_encoding {
            request = request.content_encoding(encoding);
        }

        if !attributes.tags.is_empty() {
            request = request.tagging(attributes.tags.to_query_string(MAX_S3_TAGS));
        }

        let output = request.send().await.map_err(|e| StoreError::Write {
            location: location.clone(),
            message: DisplayErrorContext(&e).to_string(),
        })?;

        info!("Uploaded to {}", location);

        Ok(BackendReceipt {
            location,
            version: output.version_id().map(str::to_string),
            etag: output.e_tag().map(|tag| tag.trim_matches('"').to_string()),
        })
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn get_object(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let location = self.location(key);

        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                return Err(StoreError::NotFound(location));
            }
            Err(e) => {
                return Err(StoreError::Read {
                    location,
                    message: DisplayErrorContext(&e).to_string(),
                });
            }
        };

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Read {
                location: location.clone(),
                message: e.to_string(),
            })?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from {}", data.len(), location);

        Ok(data)
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(StoreError::Read {
                location: self.location(key),
                message: DisplayErrorContext(&e).to_string(),
            }),
        }
    }
}
