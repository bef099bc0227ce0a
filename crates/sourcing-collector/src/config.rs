//! Validated collector configuration
//!
//! Built once, from CLI flags and their environment fallbacks, before anything
//! connects. Every limit that reaches the orchestrator has been checked here.

use crate::error::ConfigError;
use crate::feeds::HttpSnapshotConfig;
use crate::framework::{OrchestratorSettings, RetryPolicy, RunOptions};
use crate::storage::StorageConfig;
use reqwest::header::{HeaderName, HeaderValue};
use sourcing_common::Environment;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HASH_TTL_DAYS: u64 = 365;
/// A century; keeps expiry timestamps inside every backend's range
pub const MAX_HASH_TTL_DAYS: u64 = 36_500;
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;
pub const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 10;
pub const MAX_CONCURRENCY: usize = 256;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Where payloads are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageTarget {
    S3(StorageConfig),
    Local(PathBuf),
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub feed_group: String,
    pub environment: Environment,
    pub source_url: String,
    pub headers: Vec<(String, String)>,
    pub expect_json: bool,

    pub storage: StorageTarget,
    pub storage_prefix: String,

    /// `postgres://...` or `memory://`
    pub dedup_url: String,
    pub hash_ttl_days: u64,

    pub notify_url: Option<String>,
    pub notify_timeout_secs: u64,

    pub concurrency: usize,
    pub fetch_timeout_secs: u64,
    pub store_timeout_secs: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,

    pub force: bool,
}

impl CollectorConfig {
    /// Minimal configuration with defaults: local storage, in-memory dedup
    pub fn new(feed_group: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            feed_group: feed_group.into(),
            environment: Environment::default(),
            source_url: source_url.into(),
            headers: Vec::new(),
            expect_json: false,
            storage: StorageTarget::Local(PathBuf::from("./data")),
            storage_prefix: String::new(),
            dedup_url: "memory://".to_string(),
            hash_ttl_days: DEFAULT_HASH_TTL_DAYS,
            notify_url: None,
            notify_timeout_secs: DEFAULT_NOTIFY_TIMEOUT_SECS,
            concurrency: DEFAULT_CONCURRENCY,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            store_timeout_secs: DEFAULT_STORE_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            force: false,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_feed_group(&self.feed_group)?;
        validate_http_url("url", &self.source_url)?;

        for (name, value) in &self.headers {
            validate_header(name, value)?;
        }

        if let Some(url) = &self.notify_url {
            validate_http_url("notify-url", url)?;
        }

        match &self.storage {
            StorageTarget::S3(s3) => {
                s3.validate()
                    .map_err(|e| ConfigError::invalid("s3", e.to_string()))?;
            }
            StorageTarget::Local(root) if root.as_os_str().is_empty() => {
                return Err(ConfigError::Missing("local-root"));
            }
            StorageTarget::Local(_) => {}
        }

        if !(self.dedup_url.starts_with("postgres://")
            || self.dedup_url.starts_with("postgresql://")
            || self.dedup_url.starts_with("memory://"))
        {
            return Err(ConfigError::invalid(
                "dedup-url",
                format!("'{}' is not postgres://... or memory://", self.dedup_url),
            ));
        }

        if self.hash_ttl_days == 0 || self.hash_ttl_days > MAX_HASH_TTL_DAYS {
            return Err(ConfigError::invalid(
                "hash-ttl-days",
                format!("must be between 1 and {MAX_HASH_TTL_DAYS}"),
            ));
        }
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::invalid(
                "concurrency",
                format!("must be between 1 and {MAX_CONCURRENCY}"),
            ));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::invalid("fetch-timeout-secs", "must be at least 1"));
        }
        if self.store_timeout_secs == 0 {
            return Err(ConfigError::invalid("store-timeout-secs", "must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max-attempts", "must be at least 1"));
        }

        Ok(())
    }

    /// Clamped to [`MAX_HASH_TTL_DAYS`] for configs that skipped `validate`
    pub fn hash_ttl(&self) -> Duration {
        let days = self.hash_ttl_days.min(MAX_HASH_TTL_DAYS);
        Duration::from_secs(days.saturating_mul(SECS_PER_DAY))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.initial_backoff_ms))
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            concurrency: self.concurrency,
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            store_timeout: Duration::from_secs(self.store_timeout_secs),
            retry: self.retry_policy(),
            hash_ttl: self.hash_ttl(),
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions { force: self.force }
    }

    /// The policy's own request timeout matches the orchestrator's fetch timeout
    pub fn snapshot_config(&self) -> HttpSnapshotConfig {
        let mut config = HttpSnapshotConfig::new(&self.source_url);
        config.headers = self.headers.clone();
        config.expect_json = self.expect_json;
        config.timeout = Duration::from_secs(self.fetch_timeout_secs);
        if let Some(ext) = extension_of(&self.source_url) {
            config.extension = ext;
        }
        config
    }
}

/// Feed groups become path segments and key components
fn validate_feed_group(feed_group: &str) -> Result<(), ConfigError> {
    if feed_group.trim().is_empty() {
        return Err(ConfigError::Missing("feed-group"));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.');
    if !feed_group.chars().all(allowed) {
        return Err(ConfigError::invalid(
            "feed-group",
            format!("'{feed_group}' may only contain letters, digits, '_', '-' and '.'"),
        ));
    }
    Ok(())
}

fn validate_http_url(field: &'static str, raw: &str) -> Result<(), ConfigError> {
    if raw.trim().is_empty() {
        return Err(ConfigError::Missing(field));
    }
    let parsed = url::Url::parse(raw).map_err(|e| ConfigError::invalid(field, e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::invalid(
            field,
            format!("unsupported scheme '{other}'"),
        )),
    }
}

/// File extension of the URL path, when it has a short alphanumeric one
fn extension_of(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    let plausible = !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    plausible.then(|| ext.to_ascii_lowercase())
}

/// Parse a `Name: value` header flag
pub fn parse_header(raw: &str) -> Result<(String, String), ConfigError> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| ConfigError::invalid("header", format!("'{raw}' is not NAME:VALUE")))?;
    let name = name.trim();
    let value = value.trim();
    if name.is_empty() {
        return Err(ConfigError::invalid("header", format!("'{raw}' has an empty name")));
    }
    validate_header(name, value)?;
    Ok((name.to_string(), value.to_string()))
}

/// Reject headers the HTTP client would refuse at request time
fn validate_header(name: &str, value: &str) -> Result<(), ConfigError> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ConfigError::invalid("header", format!("'{name}' is not a valid header name")))?;
    HeaderValue::from_str(value).map_err(|_| {
        ConfigError::invalid("header", format!("value for '{name}' is not a valid header value"))
    })?;
    Ok(())
}
