//! Command-line interface

use crate::config::{self, CollectorConfig, StorageTarget};
use crate::error::ConfigError;
use crate::storage::StorageConfig;
use clap::{Args, Parser, Subcommand, ValueEnum};
use sourcing_common::Environment;
use std::path::PathBuf;

/// Market-data snapshot collector
#[derive(Parser, Debug)]
#[command(name = "sourcing-collector")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Debug-level logging to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect one snapshot run and print the summary as JSON
    Run(Box<RunArgs>),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    S3,
    Local,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Logical feed name; namespaces storage paths and dedup keys
    #[arg(long, env = "FEED_GROUP")]
    pub feed_group: String,

    /// Snapshot URL
    #[arg(long, env = "SOURCE_URL")]
    pub url: String,

    /// dev, staging or prod
    #[arg(long, env = "ENVIRONMENT", default_value = "dev")]
    pub environment: String,

    /// Extra request header, repeatable
    #[arg(long = "header", value_name = "NAME:VALUE")]
    pub headers: Vec<String>,

    /// Reject payloads that are not valid JSON
    #[arg(long, env = "EXPECT_JSON")]
    pub expect_json: bool,

    #[arg(long, env = "STORAGE_BACKEND", value_enum, default_value = "s3")]
    pub storage: StorageKind,

    #[arg(long, env = "S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Key prefix in front of every partition path
    #[arg(long, env = "S3_PREFIX", default_value = "")]
    pub s3_prefix: String,

    /// Custom endpoint (MinIO, LocalStack)
    #[arg(long, env = "S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    #[arg(long, env = "S3_REGION", default_value = crate::storage::config::DEFAULT_REGION)]
    pub s3_region: String,

    #[arg(long, env = "S3_PATH_STYLE")]
    pub s3_path_style: bool,

    #[arg(long, env = "S3_ACCESS_KEY", hide_env_values = true)]
    pub s3_access_key: Option<String>,

    #[arg(long, env = "S3_SECRET_KEY", hide_env_values = true)]
    pub s3_secret_key: Option<String>,

    /// Root directory for --storage local
    #[arg(long, env = "LOCAL_STORAGE_ROOT", default_value = "./data")]
    pub local_root: PathBuf,

    /// postgres://... or memory://
    #[arg(long, env = "DEDUP_URL", default_value = "memory://")]
    pub dedup_url: String,

    #[arg(long, env = "HASH_TTL_DAYS", default_value_t = config::DEFAULT_HASH_TTL_DAYS)]
    pub hash_ttl_days: u64,

    /// Webhook receiving one JSON event per collected candidate
    #[arg(long, env = "NOTIFY_URL")]
    pub notify_url: Option<String>,

    #[arg(long, env = "CONCURRENCY", default_value_t = config::DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = config::DEFAULT_FETCH_TIMEOUT_SECS)]
    pub fetch_timeout_secs: u64,

    #[arg(long, env = "STORE_TIMEOUT_SECS", default_value_t = config::DEFAULT_STORE_TIMEOUT_SECS)]
    pub store_timeout_secs: u64,

    #[arg(long, env = "MAX_ATTEMPTS", default_value_t = config::DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Store even if identical content was already collected
    #[arg(long)]
    pub force: bool,
}

impl RunArgs {
    pub fn into_config(self) -> Result<CollectorConfig, ConfigError> {
        let environment: Environment = self.environment.parse().map_err(|_| {
            ConfigError::invalid(
                "environment",
                format!("'{}' is not dev, staging or prod", self.environment),
            )
        })?;

        let headers = self
            .headers
            .iter()
            .map(|raw| config::parse_header(raw))
            .collect::<Result<Vec<_>, _>>()?;

        let storage = match self.storage {
            StorageKind::S3 => {
                let bucket = self.s3_bucket.ok_or(ConfigError::Missing("s3-bucket"))?;
                StorageTarget::S3(StorageConfig {
                    endpoint: self.s3_endpoint,
                    region: self.s3_region,
                    bucket,
                    access_key: self.s3_access_key,
                    secret_key: self.s3_secret_key,
                    path_style: self.s3_path_style,
                })
            }
            StorageKind::Local => StorageTarget::Local(self.local_root),
        };

        let mut config = CollectorConfig::new(self.feed_group, self.url);
        config.environment = environment;
        config.headers = headers;
        config.expect_json = self.expect_json;
        config.storage = storage;
        config.storage_prefix = self.s3_prefix;
        config.dedup_url = self.dedup_url;
        config.hash_ttl_days = self.hash_ttl_days;
        config.notify_url = self.notify_url.filter(|url| !url.trim().is_empty());
        config.concurrency = self.concurrency;
        config.fetch_timeout_secs = self.fetch_timeout_secs;
        config.store_timeout_secs = self.store_timeout_secs;
        config.max_attempts = self.max_attempts;
        config.force = self.force;

        config.validate()?;
        Ok(config)
    }
}
