//! [`PosterSetSource`]: the slice of MediUX the sync pipeline depends on.

use async_trait::async_trait;
use aura_core::poster::{PosterFile, PosterSet, SetKind};
use aura_core::types::Timestamp;

use crate::api::MediuxApi;
use crate::error::MediuxError;
use crate::images::{ImageCache, ImageData, ImageQuality};

#[async_trait]
pub trait PosterSetSource: Send + Sync {
    /// Latest revision of a set; `None` if it was deleted upstream.
    async fn fetch_set_by_id(
        &self,
        kind: SetKind,
        tmdb_id: &str,
        set_id: &str,
    ) -> Result<Option<PosterSet>, MediuxError>;

    /// Download-quality bytes of a file, from the full cache or upstream.
    async fn fetch_image(&self, file: &PosterFile) -> Result<ImageData, MediuxError>;

    /// Drop the cached download-quality bytes once applied, unless the
    /// image cache is enabled.
    async fn release_image(&self, file: &PosterFile) -> Result<(), MediuxError>;

    /// Public URL of the download-quality rendition.
    fn image_url(&self, file: &PosterFile) -> String;
}

/// MediUX client plus its image cache.
#[derive(Clone)]
pub struct Mediux {
    api: MediuxApi,
    cache: ImageCache,
    quality: ImageQuality,
}

impl Mediux {
    pub fn new(api: MediuxApi, cache: ImageCache, quality: ImageQuality) -> Self {
        Self { api, cache, quality }
    }

    pub fn api(&self) -> &MediuxApi {
        &self.api
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    /// Serve a rendition from disk, fetching and caching it on a miss.
    ///
    /// Thumbnails are only written back when the image cache is enabled;
    /// full renditions always are, because the apply step reads them again.
    pub async fn get_image(
        &self,
        asset_id: &str,
        modified: &Timestamp,
        quality: ImageQuality,
    ) -> Result<ImageData, MediuxError> {
        if let Some(hit) = self.cache.read(asset_id, modified, quality).await {
            tracing::trace!(asset_id, "Image cache hit");
            return Ok(hit);
        }

        let image = self.api.fetch_asset(asset_id, modified, quality).await?;
        if !quality.is_thumb() || self.cache.enabled() {
            if let Err(e) = self.cache.write(asset_id, modified, quality, &image.bytes).await {
                tracing::warn!(asset_id, error = %e, "Failed to cache image");
            }
        }
        Ok(image)
    }
}

#[async_trait]
impl PosterSetSource for Mediux {
    async fn fetch_set_by_id(
        &self,
        kind: SetKind,
        tmdb_id: &str,
        set_id: &str,
    ) -> Result<Option<PosterSet>, MediuxError> {
        self.api.fetch_set_by_id(kind, tmdb_id, set_id).await
    }

    async fn fetch_image(&self, file: &PosterFile) -> Result<ImageData, MediuxError> {
        self.get_image(&file.id, &file.modified, self.quality).await
    }

    async fn release_image(&self, file: &PosterFile) -> Result<(), MediuxError> {
        if self.cache.enabled() {
            return Ok(());
        }
        self.cache.remove(&file.id, &file.modified, self.quality).await
    }

    fn image_url(&self, file: &PosterFile) -> String {
        self.api.asset_url(&file.id, &file.modified, self.quality)
    }
}
