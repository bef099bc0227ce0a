//! PostgreSQL-backed dedup index

use super::{DedupIndex, DedupKey, DedupRecord};
use crate::error::DedupError;
use async_trait::async_trait;
use sourcing_common::Environment;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::time::Duration;
use tracing::{info, instrument};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct PgDedupIndex {
    pool: PgPool,
}

impl PgDedupIndex {
    pub async fn connect(url: &str) -> Result<Self, DedupError> {
        let pool = PgPoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .acquire_timeout(DEFAULT_ACQUIRE_TIMEOUT)
            .connect(url)
            .await?;

        info!(max_connections = DEFAULT_MAX_CONNECTIONS, "Dedup index pool created");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<(), DedupError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Delete expired rows; returns how many were removed
    #[instrument(skip(self))]
    pub async fn purge_expired(&self) -> Result<u64, DedupError> {
        let result = sqlx::query("DELETE FROM content_hashes WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;

        info!(removed = result.rows_affected(), "Purged expired dedup keys");
        Ok(result.rows_affected())
    }
}

/// Escape LIKE wildcards so feed groups containing `_` or `%` match literally
fn like_prefix(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl DedupIndex for PgDedupIndex {
    async fn ping(&self) -> Result<(), DedupError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn exists(&self, key: &DedupKey) -> Result<bool, DedupError> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM content_hashes WHERE key = $1 AND expires_at > NOW())",
        )
        .bind(key.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(found)
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn record(&self, key: &DedupKey, record: &DedupRecord, ttl: Duration) -> Result<(), DedupError> {
        sqlx::query(
            r#"
            INSERT INTO content_hashes (key, record, registered_at, expires_at)
            VALUES ($1, $2, $3, $3 + make_interval(secs => $4))
            ON CONFLICT (key) DO UPDATE SET
                record = excluded.record,
                registered_at = excluded.registered_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(key.as_str())
        .bind(Json(record))
        .bind(record.registered_at)
        .bind(ttl.as_secs_f64())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, key: &DedupKey) -> Result<Option<DedupRecord>, DedupError> {
        let row: Option<Json<DedupRecord>> = sqlx::query_scalar(
            "SELECT record FROM content_hashes WHERE key = $1 AND expires_at > NOW()",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|Json(record)| record))
    }

    async fn delete(&self, key: &DedupKey) -> Result<bool, DedupError> {
        let result = sqlx::query("DELETE FROM content_hashes WHERE key = $1 AND expires_at > NOW()")
            .bind(key.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, feed_group: &str, environment: Environment) -> Result<u64, DedupError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM content_hashes WHERE key LIKE $1 AND expires_at > NOW()",
        )
        .bind(like_prefix(&DedupKey::prefix(feed_group, environment)))
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }
}
