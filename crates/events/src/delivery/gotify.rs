//! Gotify `/message` endpoint.

use async_trait::async_trait;
use aura_core::config::GotifyConfig;
use serde_json::{json, Value};

use super::{build_client, ensure_success, require, DeliveryError, Notifier};
use crate::notification::Notification;

pub struct GotifyNotifier {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl GotifyNotifier {
    pub fn new(config: &GotifyConfig) -> Result<Self, DeliveryError> {
        require("Gotify", "URL", &config.url)?;
        require("Gotify", "Token", &config.token)?;
        Ok(Self {
            client: build_client()?,
            url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }
}

pub(crate) fn payload(notification: &Notification) -> Value {
    let mut body = json!({
        "title": notification.title,
        "message": notification.message,
        "priority": 5,
    });
    if let Some(url) = &notification.image_url {
        body["extras"] = json!({
            "client::notification": { "bigImageUrl": url }
        });
    }
    body
}

#[async_trait]
impl Notifier for GotifyNotifier {
    fn name(&self) -> &'static str {
        "Gotify"
    }

    async fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(format!("{}/message", self.url))
            .query(&[("token", self.token.as_str())])
            .json(&payload(notification))
            .send()
            .await?;
        ensure_success(response).await
    }
}
