//! The [`MediaServer`] capability set.

use std::sync::Arc;

use async_trait::async_trait;
use aura_core::config::{LibraryConfig, MediaServerConfig, MediaServerType};
use aura_core::library_cache::LibrarySection;
use aura_core::media::MediaItem;
use aura_core::poster::ImageType;

use crate::emby::EmbyJellyfinServer;
use crate::error::MediaServerError;
use crate::plex::PlexServer;

/// Item-level artwork slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtworkKind {
    Poster,
    Backdrop,
}

impl ArtworkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtworkKind::Poster => "poster",
            ArtworkKind::Backdrop => "backdrop",
        }
    }
}

impl From<ImageType> for ArtworkKind {
    fn from(t: ImageType) -> Self {
        if t.is_backdrop() {
            ArtworkKind::Backdrop
        } else {
            ArtworkKind::Poster
        }
    }
}

/// One image to put on one slot.
#[derive(Debug, Clone, Copy)]
pub struct ApplyImage<'a> {
    /// Rating key of the item, season or episode.
    pub rating_key: &'a str,
    pub image_type: ImageType,
    pub bytes: &'a [u8],
    pub content_type: &'a str,
    /// The image was written next to the media, where the server scans
    /// for local assets.
    pub server_visible_file: bool,
    /// Upstream URL the server can fetch the image from.
    pub source_url: &'a str,
}

#[async_trait]
pub trait MediaServer: Send + Sync {
    fn server_type(&self) -> MediaServerType;

    /// Server version; fails with an unreachable error when offline.
    async fn get_status(&self) -> Result<String, MediaServerError>;

    /// Server-specific handshake, run once before anything else.
    async fn init_connection(&self) -> Result<(), MediaServerError>;

    /// Fill in `SectionID`, `Type` and `Path` of a configured library.
    /// Returns `false` if the server has no section with that name.
    async fn fetch_section_info(&self, library: &mut LibraryConfig)
        -> Result<bool, MediaServerError>;

    async fn list_sections(&self) -> Result<Vec<String>, MediaServerError>;

    /// Items for listing entries `offset..offset + limit` plus the total
    /// number of listing entries. One entry may yield several items
    /// (expanded collections) or none.
    async fn fetch_section_items(
        &self,
        section: &LibrarySection,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<MediaItem>, usize), MediaServerError>;

    /// Full item, with seasons and episodes for shows.
    async fn fetch_item_content(
        &self,
        rating_key: &str,
        section_title: &str,
    ) -> Result<MediaItem, MediaServerError>;

    async fn fetch_image(&self, rating_key: &str, kind: ArtworkKind)
        -> Result<Vec<u8>, MediaServerError>;

    /// Make `image` the displayed artwork of its slot.
    async fn apply_image(&self, image: &ApplyImage<'_>) -> Result<(), MediaServerError>;

    /// Rescan metadata for one item.
    async fn refresh_item(&self, rating_key: &str) -> Result<(), MediaServerError>;

    async fn rate_item(&self, rating_key: &str, score: f32) -> Result<(), MediaServerError>;

    /// Add and remove labels on one item.
    async fn apply_labels(
        &self,
        rating_key: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<(), MediaServerError>;
}

/// Build the adapter for the configured server type.
pub fn connect(config: &MediaServerConfig) -> Result<Arc<dyn MediaServer>, MediaServerError> {
    Ok(match config.server_type {
        MediaServerType::Plex => Arc::new(PlexServer::new(config)?),
        MediaServerType::Emby | MediaServerType::Jellyfin => {
            Arc::new(EmbyJellyfinServer::new(config)?)
        }
    })
}
