//! Plex adapter.
//!
//! Talks to the Plex HTTP API with JSON responses (`Accept:
//! application/json`) and the `X-Plex-Token` header.

mod wire;

use std::time::Duration;

use async_trait::async_trait;
use aura_core::config::{LibraryConfig, MediaServerConfig, MediaServerType};
use aura_core::library_cache::LibrarySection;
use aura_core::media::{MediaItem, MediaType};
use reqwest::Method;

use crate::error::MediaServerError;
use crate::http::{ServerHttp, SCAN_TIMEOUT};
use crate::server::{ApplyImage, ArtworkKind, MediaServer};

use wire::{build_series, to_media_item, Envelope, Metadata};

const TOKEN_HEADER: &str = "X-Plex-Token";

/// Attempts at finding a freshly written local asset.
const LOCAL_ASSET_ATTEMPTS: u32 = 3;

/// Pause between a refresh and the next look at the poster list.
const LOCAL_ASSET_WAIT: Duration = Duration::from_secs(2);

const RATING_IDENTIFIER: &str = "com.plexapp.plugins.library";

pub struct PlexServer {
    http: ServerHttp,
}

impl PlexServer {
    pub fn new(config: &MediaServerConfig) -> Result<Self, MediaServerError> {
        Ok(Self {
            http: ServerHttp::new(config.base_url(), TOKEN_HEADER, &config.token)?,
        })
    }

    /// Collection endpoint listing every candidate image for a slot.
    fn list_path(rating_key: &str, kind: ArtworkKind) -> String {
        match kind {
            ArtworkKind::Poster => format!("/library/metadata/{rating_key}/posters"),
            ArtworkKind::Backdrop => format!("/library/metadata/{rating_key}/arts"),
        }
    }

    /// Endpoint that selects one existing candidate.
    fn select_path(rating_key: &str, kind: ArtworkKind) -> String {
        match kind {
            ArtworkKind::Poster => format!("/library/metadata/{rating_key}/poster"),
            ArtworkKind::Backdrop => format!("/library/metadata/{rating_key}/art"),
        }
    }

    async fn metadata(&self, path: &str) -> Result<Vec<Metadata>, MediaServerError> {
        let env: Envelope = ServerHttp::json(self.http.get(path)).await?;
        Ok(env.container.metadata)
    }

    async fn candidates(
        &self,
        rating_key: &str,
        kind: ArtworkKind,
    ) -> Result<Vec<Metadata>, MediaServerError> {
        self.metadata(&Self::list_path(rating_key, kind)).await
    }

    async fn select(
        &self,
        rating_key: &str,
        kind: ArtworkKind,
        candidate_key: &str,
    ) -> Result<(), MediaServerError> {
        let request = self
            .http
            .request(Method::PUT, &Self::select_path(rating_key, kind))
            .query(&[("url", candidate_key)]);
        ServerHttp::send(request).await?;
        Ok(())
    }

    async fn rescan(&self, rating_key: &str) -> Result<(), MediaServerError> {
        let request = self
            .http
            .request(Method::PUT, &format!("/library/metadata/{rating_key}/refresh"));
        ServerHttp::send(request).await?;
        Ok(())
    }

    /// Refresh until Plex has picked up the local asset, then select it.
    /// Returns `false` when it never showed up.
    async fn select_local_asset(
        &self,
        rating_key: &str,
        kind: ArtworkKind,
    ) -> Result<bool, MediaServerError> {
        for attempt in 1..=LOCAL_ASSET_ATTEMPTS {
            self.rescan(rating_key).await?;
            tokio::time::sleep(LOCAL_ASSET_WAIT).await;

            let candidates = self.candidates(rating_key, kind).await?;
            if let Some(local) = candidates.iter().find(|c| c.is_local_asset()) {
                self.select(rating_key, kind, &local.rating_key).await?;
                return Ok(true);
            }
            tracing::debug!(
                rating_key,
                kind = kind.as_str(),
                attempt,
                "Local asset not visible yet"
            );
        }
        Ok(false)
    }

    async fn set_from_url(
        &self,
        rating_key: &str,
        kind: ArtworkKind,
        url: &str,
    ) -> Result<(), MediaServerError> {
        let request = self
            .http
            .request(Method::POST, &Self::list_path(rating_key, kind))
            .query(&[("url", url)]);
        ServerHttp::send(request).await?;
        Ok(())
    }

    async fn upload_bytes(
        &self,
        rating_key: &str,
        kind: ArtworkKind,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), MediaServerError> {
        let request = self
            .http
            .request(Method::POST, &Self::list_path(rating_key, kind))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec());
        ServerHttp::send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl MediaServer for PlexServer {
    fn server_type(&self) -> MediaServerType {
        MediaServerType::Plex
    }

    async fn get_status(&self) -> Result<String, MediaServerError> {
        let env: Envelope = ServerHttp::json(self.http.get("/identity")).await?;
        env.container
            .version
            .ok_or_else(|| MediaServerError::Unexpected("identity has no version".into()))
    }

    async fn init_connection(&self) -> Result<(), MediaServerError> {
        let version = self.get_status().await?;
        tracing::info!(url = self.http.base_url(), %version, "Connected to Plex");
        Ok(())
    }

    async fn fetch_section_info(
        &self,
        library: &mut LibraryConfig,
    ) -> Result<bool, MediaServerError> {
        let env: Envelope = ServerHttp::json(self.http.get("/library/sections")).await?;
        let Some(dir) = env
            .container
            .directory
            .into_iter()
            .find(|d| d.title == library.name)
        else {
            return Ok(false);
        };
        library.section_id = dir.key;
        library.section_type = dir.section_type;
        if let Some(location) = dir.location.into_iter().next() {
            library.path = location.path;
        }
        Ok(true)
    }

    async fn list_sections(&self) -> Result<Vec<String>, MediaServerError> {
        let env: Envelope = ServerHttp::json(self.http.get("/library/sections")).await?;
        Ok(env.container.directory.into_iter().map(|d| d.title).collect())
    }

    async fn fetch_section_items(
        &self,
        section: &LibrarySection,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<MediaItem>, usize), MediaServerError> {
        let request = self
            .http
            .get(&format!("/library/sections/{}/all", section.id))
            .query(&[("includeGuids", "1")])
            .header("X-Plex-Container-Start", offset.to_string())
            .header("X-Plex-Container-Size", limit.to_string())
            .timeout(SCAN_TIMEOUT);
        let env: Envelope = ServerHttp::json(request).await?;

        let items: Vec<MediaItem> = env
            .container
            .metadata
            .iter()
            .filter_map(|meta| to_media_item(meta, &section.title))
            .collect();
        // Without a total, a full page means there may be more entries.
        let entries = env.container.metadata.len();
        let total = env.container.total_size.unwrap_or(if entries >= limit {
            offset + entries + 1
        } else {
            offset + entries
        });
        Ok((items, total))
    }

    async fn fetch_item_content(
        &self,
        rating_key: &str,
        section_title: &str,
    ) -> Result<MediaItem, MediaServerError> {
        let request = self
            .http
            .get(&format!("/library/metadata/{rating_key}"))
            .query(&[("includeGuids", "1")]);
        let env: Envelope = ServerHttp::json(request).await?;
        let meta = env
            .container
            .metadata
            .first()
            .ok_or_else(|| MediaServerError::NotFound(format!("rating key {rating_key}")))?;
        let mut item = to_media_item(meta, section_title).ok_or_else(|| {
            MediaServerError::Unexpected(format!(
                "Item {rating_key} is a {}, not a movie or show",
                meta.item_type
            ))
        })?;

        if item.media_type == MediaType::Show {
            let seasons = self
                .metadata(&format!("/library/metadata/{rating_key}/children"))
                .await?;
            let episodes = self
                .metadata(&format!("/library/metadata/{rating_key}/allLeaves"))
                .await?;
            let location = item
                .series
                .as_ref()
                .map(|s| s.location.clone())
                .unwrap_or_default();
            item.series = Some(build_series(&seasons, &episodes, location));
        }
        Ok(item)
    }

    async fn fetch_image(
        &self,
        rating_key: &str,
        kind: ArtworkKind,
    ) -> Result<Vec<u8>, MediaServerError> {
        let slot = match kind {
            ArtworkKind::Poster => "thumb",
            ArtworkKind::Backdrop => "art",
        };
        let request = self
            .http
            .get(&format!("/library/metadata/{rating_key}/{slot}"))
            .header(reqwest::header::ACCEPT, "image/*");
        ServerHttp::bytes(request).await
    }

    async fn apply_image(&self, image: &ApplyImage<'_>) -> Result<(), MediaServerError> {
        let kind = ArtworkKind::from(image.image_type);

        if image.server_visible_file {
            if self.select_local_asset(image.rating_key, kind).await? {
                return Ok(());
            }
            tracing::warn!(
                rating_key = image.rating_key,
                kind = kind.as_str(),
                "Local asset never appeared, falling back to upload"
            );
        }

        if image.source_url.is_empty() {
            self.upload_bytes(image.rating_key, kind, image.bytes, image.content_type)
                .await
        } else {
            self.set_from_url(image.rating_key, kind, image.source_url)
                .await
        }
    }

    async fn refresh_item(&self, rating_key: &str) -> Result<(), MediaServerError> {
        self.rescan(rating_key).await?;

        let candidates = self.candidates(rating_key, ArtworkKind::Poster).await?;
        if candidates.is_empty() || candidates.iter().any(|c| c.selected) {
            return Ok(());
        }
        let choice = candidates
            .iter()
            .find(|c| c.is_local_asset())
            .or_else(|| candidates.first());
        if let Some(choice) = choice {
            tracing::debug!(rating_key, poster = %choice.rating_key, "No poster selected, picking one");
            self.select(rating_key, ArtworkKind::Poster, &choice.rating_key)
                .await?;
        }
        Ok(())
    }

    async fn rate_item(&self, rating_key: &str, score: f32) -> Result<(), MediaServerError> {
        let rating = score.to_string();
        let request = self.http.request(Method::PUT, "/:/rate").query(&[
            ("key", rating_key),
            ("identifier", RATING_IDENTIFIER),
            ("rating", rating.as_str()),
        ]);
        ServerHttp::send(request).await?;
        Ok(())
    }

    async fn apply_labels(
        &self,
        rating_key: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<(), MediaServerError> {
        if add.is_empty() && remove.is_empty() {
            return Ok(());
        }
        let params = label_params(add, remove);
        let request = self
            .http
            .request(Method::PUT, &format!("/library/metadata/{rating_key}"))
            .query(&params);
        ServerHttp::send(request).await?;
        Ok(())
    }
}

/// Query parameters Plex uses to edit the label field of one item.
fn label_params(add: &[String], remove: &[String]) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = add
        .iter()
        .enumerate()
        .map(|(i, label)| (format!("label[{i}].tag.tag"), label.clone()))
        .collect();
    if !remove.is_empty() {
        params.push(("label[].tag.tag-".to_string(), remove.join(",")));
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_endpoints_differ_by_method() {
        assert_eq!(
            PlexServer::list_path("42", ArtworkKind::Poster),
            "/library/metadata/42/posters"
        );
        assert_eq!(
            PlexServer::select_path("42", ArtworkKind::Backdrop),
            "/library/metadata/42/art"
        );
    }

    #[test]
    fn label_params_add_and_remove() {
        let params = label_params(
            &["aura".to_string(), "aura-poster".to_string()],
            &["overlay".to_string()],
        );
        assert_eq!(params[0], ("label[0].tag.tag".to_string(), "aura".to_string()));
        assert_eq!(params[1].0, "label[1].tag.tag");
        assert_eq!(params[2], ("label[].tag.tag-".to_string(), "overlay".to_string()));
        assert!(label_params(&[], &[]).is_empty());
    }

    #[test]
    fn new_trims_base_url() {
        let config = MediaServerConfig {
            url: "http://plex.local:32400/".into(),
            token: "t".into(),
            ..Default::default()
        };
        let server = PlexServer::new(&config).unwrap();
        assert_eq!(server.http.base_url(), "http://plex.local:32400");
        assert_eq!(server.server_type(), MediaServerType::Plex);
    }
}
