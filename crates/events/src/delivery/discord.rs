//! Discord webhook with a single embed.

use async_trait::async_trait;
use aura_core::config::DiscordConfig;
use serde_json::{json, Value};

use super::{build_client, ensure_success, require, DeliveryError, Notifier};
use crate::notification::Notification;

/// Embed accent colour.
const EMBED_COLOR: u32 = 0x5865F2;

pub struct DiscordNotifier {
    client: reqwest::Client,
    webhook: String,
}

impl DiscordNotifier {
    pub fn new(config: &DiscordConfig) -> Result<Self, DeliveryError> {
        require("Discord", "Webhook", &config.webhook)?;
        Ok(Self {
            client: build_client()?,
            webhook: config.webhook.clone(),
        })
    }
}

pub(crate) fn payload(notification: &Notification) -> Value {
    let mut embed = json!({
        "title": notification.title,
        "description": notification.message,
        "color": EMBED_COLOR,
    });
    if let Some(author) = &notification.author {
        embed["author"] = json!({ "name": author });
    }
    if let Some(url) = &notification.image_url {
        embed["image"] = json!({ "url": url });
    }
    json!({ "embeds": [embed] })
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &'static str {
        "Discord"
    }

    async fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.webhook)
            .json(&payload(notification))
            .send()
            .await?;
        ensure_success(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn embed_carries_author_and_image() {
        let n = Notification::new("Alien (1979) - Poster", "Downloading")
            .with_author("aura")
            .with_image("https://images.mediux.io/assets/abc");
        let body = payload(&n);
        let embed = &body["embeds"][0];
        assert_eq!(embed["title"], "Alien (1979) - Poster");
        assert_eq!(embed["author"]["name"], "aura");
        assert_eq!(embed["image"]["url"], "https://images.mediux.io/assets/abc");
    }

    #[test]
    fn embed_without_image() {
        let body = payload(&Notification::new("t", "m"));
        assert!(body["embeds"][0].get("image").is_none());
    }

    #[test]
    fn webhook_is_required() {
        let err = DiscordNotifier::new(&DiscordConfig::default()).err().unwrap();
        assert_matches!(err, DeliveryError::Misconfigured { field: "Webhook", .. });
    }
}
