//! Plex labels and Sonarr/Radarr tags reapplied after an image lands.

use std::collections::BTreeSet;
use std::sync::Arc;

use aura_core::config::{
    selected_type_label, ArrType, LabelApplication, LabelRule, LabelsAndTagsConfig,
    MediaServerType, SonarrRadarrConfig,
};
use aura_core::media::MediaItem;
use aura_core::poster::{ImageType, SelectedTypes};
use aura_mediaserver::{ArrClient, MediaServer};

/// Labels to add and remove for one item under `rule`.
///
/// With `AddLabelsForSelectedTypes`, selected types get their `aura-*` label
/// and unselected ones lose it. A label never appears in both lists.
pub fn label_plan(rule: &LabelRule, selected: &SelectedTypes) -> (Vec<String>, Vec<String>) {
    let mut add: BTreeSet<String> = rule.add.iter().cloned().collect();
    let mut remove: BTreeSet<String> = rule.remove.iter().cloned().collect();
    if rule.add_labels_for_selected_types {
        for image_type in ImageType::ALL {
            let label = selected_type_label(image_type);
            if selected.contains(image_type) {
                add.insert(label);
            } else {
                remove.insert(label);
            }
        }
    }
    remove.retain(|label| !add.contains(label));
    (add.into_iter().collect(), remove.into_iter().collect())
}

/// Applies the configured label rules to the media server and to any
/// Sonarr/Radarr instance that manages the item's library.
#[derive(Clone)]
pub struct LabelSync {
    server: Arc<dyn MediaServer>,
    arr: Vec<Arc<ArrClient>>,
    config: LabelsAndTagsConfig,
}

impl LabelSync {
    pub fn new(
        server: Arc<dyn MediaServer>,
        config: LabelsAndTagsConfig,
        arr: Vec<Arc<ArrClient>>,
    ) -> Self {
        Self { server, arr, config }
    }

    /// Build Sonarr/Radarr clients from config; bad entries are logged and
    /// left out.
    pub fn from_config(
        server: Arc<dyn MediaServer>,
        config: LabelsAndTagsConfig,
        arr: &SonarrRadarrConfig,
    ) -> Self {
        let clients = arr
            .applications
            .iter()
            .filter_map(|app| match ArrClient::new(app) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    tracing::warn!(app = ?app.app_type, library = %app.library, error = %e, "Skipping Sonarr/Radarr instance");
                    None
                }
            })
            .collect();
        Self::new(server, config, clients)
    }

    /// Whether any rule would touch anything.
    pub fn is_active(&self) -> bool {
        self.config.applications.iter().any(|r| r.enabled)
    }

    /// Reapply labels and tags for `item`. Every target is tried; the error
    /// lists the ones that failed.
    pub async fn sync(&self, item: &MediaItem, selected: &SelectedTypes) -> anyhow::Result<()> {
        let mut failed = Vec::new();

        if self.server.server_type() == MediaServerType::Plex {
            if let Some(rule) = self.config.rule_for(LabelApplication::Plex) {
                let (add, remove) = label_plan(rule, selected);
                if let Err(e) = self.server.apply_labels(&item.rating_key, &add, &remove).await {
                    tracing::warn!(rating_key = %item.rating_key, error = %e, "Failed to apply Plex labels");
                    failed.push("Plex".to_string());
                }
            }
        }

        for client in self.arr.iter().filter(|c| c.library() == item.library_title) {
            let app = match client.app_type() {
                ArrType::Sonarr => LabelApplication::Sonarr,
                ArrType::Radarr => LabelApplication::Radarr,
            };
            let Some(rule) = self.config.rule_for(app) else {
                continue;
            };
            let (add, remove) = label_plan(rule, selected);
            if let Err(e) = client.update_tags(&item.tmdb_id, &add, &remove).await {
                tracing::warn!(tmdb_id = %item.tmdb_id, app = ?app, error = %e, "Failed to update tags");
                failed.push(format!("{app:?}"));
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("label sync failed for {}", failed.join(", "))
        }
    }
}
