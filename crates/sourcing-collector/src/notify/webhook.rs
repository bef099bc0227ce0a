use super::{NotificationEvent, Notifier};
use crate::error::NotifyError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// POSTs each event as JSON to a fixed URL
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sourcing-collector/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(skip(self, event), fields(url = %self.url, identifier = %event.identifier))]
    async fn publish(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(event).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        debug!(status = status.as_u16(), "Published collection event");
        Ok(())
    }
}
