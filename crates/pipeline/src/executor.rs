//! Download-and-apply for one scheduled file.
//!
//! The apply itself is sequential: bytes, optional local copy, server apply,
//! cache release. Labels, notifications and thumbnail invalidation are handed
//! to the [`TaskPool`] and never fail the apply.

use std::sync::Arc;

use aura_core::config::{AppPaths, ImagesConfig, MediaServerType};
use aura_core::library_cache::LibraryCache;
use aura_core::media::MediaItem;
use aura_core::poster::SelectedTypes;
use aura_events::{Notification, NotificationDispatcher, TaskPool};
use aura_mediaserver::{ApplyImage, MediaServer};
use aura_mediux::PosterSetSource;

use crate::detection::ScheduledDownload;
use crate::error::PipelineError;
use crate::labels::LabelSync;
use crate::paths;

#[derive(Clone)]
pub struct Executor {
    server: Arc<dyn MediaServer>,
    source: Arc<dyn PosterSetSource>,
    cache: Arc<LibraryCache>,
    pool: TaskPool,
    notifications: NotificationDispatcher,
    labels: Option<LabelSync>,
    paths: AppPaths,
    images: ImagesConfig,
    season_naming_convention: u8,
}

impl Executor {
    pub fn new(
        server: Arc<dyn MediaServer>,
        source: Arc<dyn PosterSetSource>,
        cache: Arc<LibraryCache>,
        pool: TaskPool,
        paths: AppPaths,
    ) -> Self {
        Self {
            server,
            source,
            cache,
            pool,
            notifications: NotificationDispatcher::default(),
            labels: None,
            paths,
            images: ImagesConfig::default(),
            season_naming_convention: 2,
        }
    }

    pub fn with_images(mut self, images: ImagesConfig, season_naming_convention: u8) -> Self {
        self.images = images;
        self.season_naming_convention = season_naming_convention;
        self
    }

    pub fn with_notifications(mut self, notifications: NotificationDispatcher) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn with_labels(mut self, labels: LabelSync) -> Self {
        self.labels = Some(labels).filter(LabelSync::is_active);
        self
    }

    pub fn server(&self) -> &Arc<dyn MediaServer> {
        &self.server
    }

    pub fn source(&self) -> &Arc<dyn PosterSetSource> {
        &self.source
    }

    pub fn cache(&self) -> &Arc<LibraryCache> {
        &self.cache
    }

    /// Put `scheduled.file` on its slot of `item`.
    pub async fn apply(
        &self,
        item: &MediaItem,
        scheduled: &ScheduledDownload,
        selected: &SelectedTypes,
    ) -> Result<(), PipelineError> {
        let file = &scheduled.file;
        let label = file.describe();
        let rating_key = item
            .target_rating_key(file)
            .ok_or_else(|| PipelineError::MissingTarget(format!("{} of {}", label, item.title)))?;

        let image = self.source.fetch_image(file).await?;
        let written = self.write_local_copy(item, scheduled, &image.bytes).await?;
        let source_url = self.source.image_url(file);

        self.server
            .apply_image(&ApplyImage {
                rating_key: &rating_key,
                image_type: file.effective_type(),
                bytes: &image.bytes,
                content_type: &image.content_type,
                server_visible_file: written && paths::server_visible(&self.images),
                source_url: &source_url,
            })
            .await?;

        if let Err(e) = self.source.release_image(file).await {
            tracing::warn!(file_id = %file.id, error = %e, "Failed to release cached image");
        }

        tracing::info!(
            title = %item.title,
            library = %item.library_title,
            file = %label,
            reason = %scheduled.reason_detail,
            "{}", scheduled.reason_title
        );

        self.after_apply(item, scheduled, selected, &rating_key, source_url);
        Ok(())
    }

    /// Write the image next to the media (or under the images root) when
    /// saving locally on Plex. Returns whether a file was written.
    async fn write_local_copy(
        &self,
        item: &MediaItem,
        scheduled: &ScheduledDownload,
        bytes: &[u8],
    ) -> Result<bool, PipelineError> {
        if !self.images.save_images_locally.enabled
            || self.server.server_type() != MediaServerType::Plex
        {
            return Ok(false);
        }
        let library_root = self
            .cache
            .get_by_title(&item.library_title)
            .await
            .map(|s| s.path);
        let Some(dest) = paths::local_destination(
            item,
            &scheduled.file,
            self.season_naming_convention,
            paths::images_root(&self.images),
            library_root.as_deref(),
        ) else {
            tracing::warn!(title = %item.title, file = %scheduled.file.describe(), "No local path for image");
            return Ok(false);
        };

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&dest, bytes).await?;
        tracing::debug!(path = %dest.display(), "Image saved locally");
        Ok(true)
    }

    fn after_apply(
        &self,
        item: &MediaItem,
        scheduled: &ScheduledDownload,
        selected: &SelectedTypes,
        rating_key: &str,
        source_url: String,
    ) {
        let labels = self.labels.clone();
        let notifications = self.notifications.clone();
        let thumb = paths::thumb_path(
            &self.paths,
            self.server.server_type(),
            rating_key,
            scheduled.file.effective_type(),
        );
        let notification = Notification::image_applied(
            &item.title,
            item.year,
            &scheduled.file.describe(),
            &scheduled.reason_title,
            &scheduled.reason_detail,
        )
        .with_image(source_url);
        let item = item.clone();
        let selected = selected.clone();

        self.pool.submit("post_apply", async move {
            match tokio::fs::remove_file(&thumb).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::debug!(path = %thumb.display(), error = %e, "Failed to remove thumbnail"),
            }
            if !notifications.is_empty() {
                notifications.dispatch(&notification).await;
            }
            if let Some(labels) = labels {
                labels.sync(&item, &selected).await?;
            }
            Ok(())
        });
    }
}
