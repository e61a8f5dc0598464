//! Provider-neutral notification message.

use serde::{Deserialize, Serialize};

/// One message to send to every provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    /// Public URL of an image to embed, when the provider supports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Shown as the author line on providers that have one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            image_url: None,
            author: None,
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.image_url = Some(url).filter(|u| !u.is_empty());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Message for one applied image, e.g.
    /// `Game of Thrones (2011) - Season 03 Poster` / `Season 03 was added`.
    pub fn image_applied(
        item_title: &str,
        year: i32,
        file_label: &str,
        reason_title: &str,
        reason_detail: &str,
    ) -> Self {
        let title = if year > 0 {
            format!("{item_title} ({year}) - {file_label}")
        } else {
            format!("{item_title} - {file_label}")
        };
        let message = if reason_detail.is_empty() {
            reason_title.to_string()
        } else {
            format!("{reason_title}: {reason_detail}")
        };
        Self::new(title, message).with_author("aura")
    }
}
