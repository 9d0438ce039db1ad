//! Discord webhook notifier.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::config::DiscordConfig;

use super::sender::{NotificationEvent, Notifier, NotifyError, Route};

/// Connection timeout for webhook requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Overall timeout for webhook requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts events to up to two Discord webhooks.
///
/// Every event goes to the log webhook; [`Route::Primary`] events also go
/// to the server webhook. Discord answers a successful post with 204.
#[derive(Debug, Clone)]
pub struct DiscordWebhook {
    client: Client,
    webhook: Option<Url>,
    log_webhook: Option<Url>,
}

impl DiscordWebhook {
    /// Create a notifier for the given webhooks.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Client`] if the HTTP client cannot be built.
    pub fn new(webhook: Option<Url>, log_webhook: Option<Url>) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;
        Ok(Self::with_client(client, webhook, log_webhook))
    }

    /// Create a notifier that posts through an existing client.
    #[must_use]
    pub fn with_client(client: Client, webhook: Option<Url>, log_webhook: Option<Url>) -> Self {
        Self {
            client,
            webhook,
            log_webhook,
        }
    }

    /// Create a notifier from the `[discord]` section.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Client`] if the HTTP client cannot be built.
    pub fn from_config(config: &DiscordConfig) -> Result<Self, NotifyError> {
        Self::new(config.webhook_url.clone(), config.log_webhook_url.clone())
    }

    async fn post(&self, url: &Url, text: &str) -> Result<(), NotifyError> {
        let body = serde_json::json!({ "content": text });
        let response = self
            .client
            .post(url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Notifier for DiscordWebhook {
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        let mut first_error = None;

        if let Some(url) = &self.log_webhook {
            if let Err(e) = self.post(url, &event.text).await {
                first_error = Some(e);
            }
        }

        if event.route == Route::Primary {
            if let Some(url) = &self.webhook {
                if let Err(e) = self.post(url, &event.text).await {
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}
