//! External notification providers.

pub mod discord;
pub mod gotify;
pub mod pushover;
pub mod webhook;

use std::time::Duration;

use async_trait::async_trait;

use crate::notification::Notification;

/// HTTP request timeout for a single delivery attempt.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Provider returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// A required field of the provider configuration is empty.
    #[error("{provider} is missing {field}")]
    Misconfigured {
        provider: &'static str,
        field: &'static str,
    },
}

/// One notification provider.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

pub(crate) fn build_client() -> Result<reqwest::Client, DeliveryError> {
    Ok(reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

pub(crate) fn require(
    provider: &'static str,
    field: &'static str,
    value: &str,
) -> Result<(), DeliveryError> {
    if value.trim().is_empty() {
        return Err(DeliveryError::Misconfigured { provider, field });
    }
    Ok(())
}

/// Map a non-2xx response to [`DeliveryError::HttpStatus`].
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<(), DeliveryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(DeliveryError::HttpStatus {
        status: status.as_u16(),
        body,
    })
}
