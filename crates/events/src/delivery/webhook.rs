//! Generic webhook delivery with exponential-backoff retry.
//!
//! [`WebhookNotifier`] POSTs `{title, message, image_url?}` to a user URL
//! with user-supplied headers. Failed attempts are retried up to three
//! times with exponential backoff (1 s, 2 s, 4 s).

use std::time::Duration;

use async_trait::async_trait;
use aura_core::config::WebhookConfig;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{json, Value};

use super::{build_client, ensure_success, require, DeliveryError, Notifier};
use crate::notification::Notification;

/// Retry delays in seconds (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
    retry_delays: Vec<Duration>,
}

impl WebhookNotifier {
    pub fn new(config: &WebhookConfig) -> Result<Self, DeliveryError> {
        require("Webhook", "URL", &config.url)?;
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Skipping invalid webhook header"),
            }
        }
        Ok(Self {
            client: build_client()?,
            url: config.url.clone(),
            headers,
            retry_delays: RETRY_DELAYS_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        })
    }

    /// Override the backoff schedule.
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    /// Execute a single POST request and check the response status.
    async fn try_send(&self, payload: &Value) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .json(payload)
            .send()
            .await?;
        ensure_success(response).await
    }
}

pub(crate) fn payload(notification: &Notification) -> Value {
    let mut body = json!({
        "title": notification.title,
        "message": notification.message,
    });
    if let Some(url) = &notification.image_url {
        body["image_url"] = json!(url);
    }
    body
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "Webhook"
    }

    /// Retries with backoff before giving up. Returns `Ok(())` on the first
    /// successful attempt.
    async fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let payload = payload(notification);

        for (attempt, delay) in self.retry_delays.iter().enumerate() {
            match self.try_send(&payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url = %self.url,
                        error = %e,
                        "Webhook delivery attempt failed, retrying"
                    );
                    tokio::time::sleep(*delay).await;
                }
            }
        }

        // Final attempt after the last backoff.
        self.try_send(&payload).await.inspect_err(|e| {
            tracing::error!(url = %self.url, error = %e, "Webhook delivery failed after all retries");
        })
    }
}
