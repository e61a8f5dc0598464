//! Pushover messages API, with the image streamed as an attachment.

use async_trait::async_trait;
use aura_core::config::PushoverConfig;
use reqwest::multipart::{Form, Part};

use super::{build_client, ensure_success, require, DeliveryError, Notifier};
use crate::notification::Notification;

const MESSAGES_URL: &str = "https://api.pushover.net/1/messages.json";

pub struct PushoverNotifier {
    client: reqwest::Client,
    token: String,
    user_key: String,
}

impl PushoverNotifier {
    pub fn new(config: &PushoverConfig) -> Result<Self, DeliveryError> {
        require("Pushover", "Token", &config.token)?;
        require("Pushover", "UserKey", &config.user_key)?;
        Ok(Self {
            client: build_client()?,
            token: config.token.clone(),
            user_key: config.user_key.clone(),
        })
    }

    /// Image bytes for the attachment. Failure to fetch drops the image,
    /// not the message.
    async fn attachment(&self, url: &str) -> Option<Part> {
        let response = match self.client.get(url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::warn!(status = r.status().as_u16(), "Pushover image fetch failed");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Pushover image fetch failed");
                return None;
            }
        };
        let bytes = response.bytes().await.ok()?;
        Part::bytes(bytes.to_vec())
            .file_name("image.jpg")
            .mime_str("image/jpeg")
            .ok()
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    fn name(&self) -> &'static str {
        "Pushover"
    }

    async fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let mut form = Form::new()
            .text("token", self.token.clone())
            .text("user", self.user_key.clone())
            .text("title", notification.title.clone())
            .text("message", notification.message.clone());
        if let Some(url) = &notification.image_url {
            if let Some(part) = self.attachment(url).await {
                form = form.part("attachment", part);
            }
        }
        let response = self.client.post(MESSAGES_URL).multipart(form).send().await?;
        ensure_success(response).await
    }
}
