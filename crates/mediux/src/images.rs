//! On-disk cache for MediUX asset renditions.
//!
//! Files are named `{asset_id}_{YYYYMMDDHHMMSS}.jpg`, so a new upstream
//! revision never hits a stale entry. Thumbnails live under
//! `temp-images/mediux/thumbs`, full renditions under `temp-images/mediux/full`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use aura_core::config::{AppPaths, DownloadQuality};
use aura_core::time::cache_buster;
use aura_core::types::Timestamp;

use crate::error::MediuxError;

/// Which rendition of an asset to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageQuality {
    Original,
    Optimized,
    Thumb,
}

impl ImageQuality {
    /// The `key` query parameter selecting the rendition; the original has none.
    pub fn key(&self) -> Option<&'static str> {
        match self {
            ImageQuality::Original => None,
            ImageQuality::Optimized => Some("jpg"),
            ImageQuality::Thumb => Some("thumb"),
        }
    }

    pub fn is_thumb(&self) -> bool {
        matches!(self, ImageQuality::Thumb)
    }
}

impl From<DownloadQuality> for ImageQuality {
    fn from(q: DownloadQuality) -> Self {
        match q {
            DownloadQuality::Original => ImageQuality::Original,
            DownloadQuality::Optimized => ImageQuality::Optimized,
        }
    }
}

/// Image bytes plus their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct ImageCache {
    thumbs_dir: PathBuf,
    full_dir: PathBuf,
    /// Keep thumbnails and full renditions after use.
    enabled: bool,
}

impl ImageCache {
    pub fn new(thumbs_dir: impl Into<PathBuf>, full_dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            thumbs_dir: thumbs_dir.into(),
            full_dir: full_dir.into(),
            enabled,
        }
    }

    pub fn from_paths(paths: &AppPaths, enabled: bool) -> Self {
        Self::new(paths.mediux_thumbs(), paths.mediux_full(), enabled)
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn file_name(asset_id: &str, modified: &Timestamp) -> String {
        format!("{asset_id}_{}.jpg", cache_buster(modified))
    }

    pub fn path_for(&self, asset_id: &str, modified: &Timestamp, quality: ImageQuality) -> PathBuf {
        let dir = if quality.is_thumb() {
            &self.thumbs_dir
        } else {
            &self.full_dir
        };
        dir.join(Self::file_name(asset_id, modified))
    }

    /// Cached bytes, or `None` on a miss or unreadable file.
    pub async fn read(
        &self,
        asset_id: &str,
        modified: &Timestamp,
        quality: ImageQuality,
    ) -> Option<ImageData> {
        let path = self.path_for(asset_id, modified, quality);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Some(ImageData {
                bytes,
                content_type: "image/jpeg".to_string(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable cached image");
                None
            }
        }
    }

    pub async fn write(
        &self,
        asset_id: &str,
        modified: &Timestamp,
        quality: ImageQuality,
        bytes: &[u8],
    ) -> Result<PathBuf, MediuxError> {
        let path = self.path_for(asset_id, modified, quality);
        write_file(&path, bytes).await?;
        Ok(path)
    }

    /// Delete an entry; a missing file is not an error.
    pub async fn remove(
        &self,
        asset_id: &str,
        modified: &Timestamp,
        quality: ImageQuality,
    ) -> Result<(), MediuxError> {
        let path = self.path_for(asset_id, modified, quality);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), MediuxError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}
