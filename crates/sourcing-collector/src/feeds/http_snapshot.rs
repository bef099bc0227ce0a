//! Generic "GET one document per run" policy
//!
//! Suits feeds that publish a current snapshot at a fixed URL. Each run yields
//! a single candidate named after the run's start minute, e.g.
//! `miso_binding_constraints_20250120_1435.json`, so two runs in the same
//! minute share a storage path.

use crate::error::FetchError;
use crate::framework::{Candidate, CollectorPolicy, RunContext, ScalarValue};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PARAM_HEADERS: &str = "headers";
const PARAM_TIMEOUT_SECS: &str = "timeout_secs";

#[derive(Debug, Clone)]
pub struct HttpSnapshotConfig {
    pub url: String,
    /// File extension of the identifier, without the dot
    pub extension: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
    /// Reject payloads that do not parse as JSON
    pub expect_json: bool,
    /// Extra tags copied onto every candidate
    pub metadata: BTreeMap<String, ScalarValue>,
}

impl HttpSnapshotConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            extension: "json".to_string(),
            headers: Vec::new(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            expect_json: false,
            metadata: BTreeMap::new(),
        }
    }
}

pub struct HttpSnapshotPolicy {
    client: Client,
    config: HttpSnapshotConfig,
}

impl HttpSnapshotPolicy {
    pub fn new(config: HttpSnapshotConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("sourcing-collector/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }
}

fn headers_from_params(params: &BTreeMap<String, Value>) -> Vec<(String, String)> {
    params
        .get(PARAM_HEADERS)
        .and_then(Value::as_object)
        .map(|headers| {
            headers
                .iter()
                .filter_map(|(name, value)| value.as_str().map(|v| (name.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn timeout_from_params(params: &BTreeMap<String, Value>) -> Option<Duration> {
    params
        .get(PARAM_TIMEOUT_SECS)
        .and_then(Value::as_f64)
        .filter(|secs| *secs > 0.0)
        .map(Duration::from_secs_f64)
}

#[async_trait]
impl CollectorPolicy for HttpSnapshotPolicy {
    async fn generate_candidates(&self, ctx: &RunContext) -> anyhow::Result<Vec<Candidate>> {
        let at = ctx.started_at;
        let identifier = format!(
            "{}_{}.{}",
            ctx.feed_group,
            at.format("%Y%m%d_%H%M"),
            self.config.extension.trim_start_matches('.')
        );

        let headers: serde_json::Map<String, Value> = self
            .config
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(value.clone())))
            .collect();

        let mut candidate = Candidate::new(identifier, &self.config.url, at.date_naive())
            .with_metadata("feed_group", ctx.feed_group.as_str())
            .with_metadata("collected_at", at.to_rfc3339())
            .with_param(PARAM_HEADERS, Value::Object(headers))
            .with_param(PARAM_TIMEOUT_SECS, json!(self.config.timeout.as_secs_f64()));
        for (key, value) in &self.config.metadata {
            candidate = candidate.with_metadata(key.clone(), value.clone());
        }

        Ok(vec![candidate])
    }

    async fn collect_content(
        &self,
        candidate: &Candidate,
        _ctx: &RunContext,
    ) -> Result<Vec<u8>, FetchError> {
        let url = &candidate.source_location;
        let timeout = timeout_from_params(&candidate.collection_params).unwrap_or(self.config.timeout);

        let mut request = self.client.get(url).timeout(timeout);
        for (name, value) in headers_from_params(&candidate.collection_params) {
            request = request.header(name, value);
        }

        let transport = |source: reqwest::Error| {
            if source.is_timeout() {
                FetchError::Timeout(timeout)
            } else {
                FetchError::Transport {
                    url: url.clone(),
                    source,
                }
            }
        };

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(transport)?;
        debug!(bytes = body.len(), "Fetched snapshot");
        Ok(body.to_vec())
    }

    fn validate_content(&self, content: &[u8], candidate: &Candidate, _ctx: &RunContext) -> bool {
        if content.is_empty() {
            warn!(candidate = %candidate.identifier, "Empty payload");
            return false;
        }

        if self.config.expect_json {
            if let Err(e) = serde_json::from_slice::<Value>(content) {
                warn!(candidate = %candidate.identifier, error = %e, "Payload is not valid JSON");
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sourcing_common::Environment;

    fn context() -> RunContext {
        let mut ctx = RunContext::new("miso_binding_constraints", Environment::Dev);
        ctx.started_at = chrono::Utc.with_ymd_and_hms(2025, 1, 20, 14, 35, 12).unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_one_candidate_named_after_run_minute() {
        let mut config = HttpSnapshotConfig::new("https://api.test/constraints");
        config.headers.push(("Ocp-Apim-Subscription-Key".into(), "secret".into()));
        config.metadata.insert("source".into(), ScalarValue::from("miso"));
        let policy = HttpSnapshotPolicy::new(config).unwrap();

        let candidates = policy.generate_candidates(&context()).await.unwrap();
        assert_eq!(candidates.len(), 1);

        let candidate = &candidates[0];
        assert_eq!(candidate.identifier, "miso_binding_constraints_20250120_1435.json");
        assert_eq!(candidate.file_date.to_string(), "2025-01-20");
        assert_eq!(candidate.metadata.get("source"), Some(&ScalarValue::from("miso")));
        assert_eq!(
            headers_from_params(&candidate.collection_params),
            vec![("Ocp-Apim-Subscription-Key".to_string(), "secret".to_string())]
        );
        assert_eq!(
            timeout_from_params(&candidate.collection_params),
            Some(DEFAULT_REQUEST_TIMEOUT)
        );
    }

    #[test]
    fn test_validation() {
        let mut config = HttpSnapshotConfig::new("https://api.test");
        config.expect_json = true;
        let policy = HttpSnapshotPolicy::new(config).unwrap();
        let ctx = context();
        let candidate = Candidate::new("c", "https://api.test", ctx.started_at.date_naive());

        assert!(policy.validate_content(br#"{"RefId":"X","Constraint":[]}"#, &candidate, &ctx));
        assert!(!policy.validate_content(b"", &candidate, &ctx));
        assert!(!policy.validate_content(b"<html>maintenance</html>", &candidate, &ctx));
    }
}
