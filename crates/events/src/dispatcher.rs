//! Fan-out of one notification to every enabled provider.

use std::sync::Arc;

use aura_core::config::{NotificationProviderConfig, NotificationProviderKind, NotificationsConfig};

use crate::delivery::discord::DiscordNotifier;
use crate::delivery::gotify::GotifyNotifier;
use crate::delivery::pushover::PushoverNotifier;
use crate::delivery::webhook::WebhookNotifier;
use crate::delivery::{DeliveryError, Notifier};
use crate::notification::Notification;

#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl NotificationDispatcher {
    /// Build notifiers for every enabled provider. A misconfigured provider
    /// is logged and left out.
    pub fn from_config(config: &NotificationsConfig) -> Self {
        if !config.enabled {
            return Self::default();
        }
        let notifiers = config
            .providers
            .iter()
            .filter(|p| p.enabled)
            .filter_map(|p| match build_notifier(p) {
                Ok(n) => Some(n),
                Err(e) => {
                    tracing::warn!(provider = ?p.provider, error = %e, "Notification provider disabled");
                    None
                }
            })
            .collect();
        Self { notifiers }
    }

    pub fn with_notifiers(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Send to all providers concurrently. Returns the names of the
    /// providers that failed; each failure is logged.
    pub async fn dispatch(&self, notification: &Notification) -> Vec<&'static str> {
        let sends = self.notifiers.iter().map(|n| async move {
            let result = n.send(notification).await;
            (n.name(), result)
        });
        futures::future::join_all(sends)
            .await
            .into_iter()
            .filter_map(|(name, result)| match result {
                Ok(()) => None,
                Err(e) => {
                    tracing::error!(provider = name, error = %e, title = %notification.title, "Notification failed");
                    Some(name)
                }
            })
            .collect()
    }
}

fn build_notifier(config: &NotificationProviderConfig) -> Result<Arc<dyn Notifier>, DeliveryError> {
    let missing = |provider: &'static str| DeliveryError::Misconfigured {
        provider,
        field: "settings",
    };
    let notifier: Arc<dyn Notifier> = match config.provider {
        NotificationProviderKind::Discord => {
            let c = config.discord.as_ref().ok_or_else(|| missing("Discord"))?;
            Arc::new(DiscordNotifier::new(c)?)
        }
        NotificationProviderKind::Pushover => {
            let c = config.pushover.as_ref().ok_or_else(|| missing("Pushover"))?;
            Arc::new(PushoverNotifier::new(c)?)
        }
        NotificationProviderKind::Gotify => {
            let c = config.gotify.as_ref().ok_or_else(|| missing("Gotify"))?;
            Arc::new(GotifyNotifier::new(c)?)
        }
        NotificationProviderKind::Webhook => {
            let c = config.webhook.as_ref().ok_or_else(|| missing("Webhook"))?;
            Arc::new(WebhookNotifier::new(c)?)
        }
    };
    Ok(notifier)
}
