//! Emby and Jellyfin adapter.
//!
//! Both servers speak the same API for everything aura needs. Item listings
//! are scoped to a user, so the adapter resolves an administrator id once at
//! [`MediaServer::init_connection`] (or takes it from the configuration).

mod wire;

use async_trait::async_trait;
use aura_core::config::{LibraryConfig, MediaServerConfig, MediaServerType};
use aura_core::library_cache::LibrarySection;
use aura_core::media::{MediaItem, MediaType};
use base64::Engine;
use reqwest::Method;
use tokio::sync::RwLock;

use crate::error::MediaServerError;
use crate::http::{ServerHttp, SCAN_TIMEOUT};
use crate::server::{ApplyImage, ArtworkKind, MediaServer};

use wire::{
    backdrop_tags, build_series, first_admin, new_backdrop_index, to_media_item, BaseItem,
    ImageInfo, ItemsPage, SystemInfo, User, VirtualFolder, ITEM_FIELDS,
};

const TOKEN_HEADER: &str = "X-Emby-Token";

pub struct EmbyJellyfinServer {
    http: ServerHttp,
    server_type: MediaServerType,
    user_id: RwLock<Option<String>>,
}

impl EmbyJellyfinServer {
    pub fn new(config: &MediaServerConfig) -> Result<Self, MediaServerError> {
        let user_id = Some(config.user_id.trim().to_string()).filter(|id| !id.is_empty());
        Ok(Self {
            http: ServerHttp::new(config.base_url(), TOKEN_HEADER, &config.token)?,
            server_type: config.server_type,
            user_id: RwLock::new(user_id),
        })
    }

    fn image_slot(kind: ArtworkKind) -> &'static str {
        match kind {
            ArtworkKind::Poster => "Primary",
            ArtworkKind::Backdrop => "Backdrop",
        }
    }

    /// Cached admin id, resolved on first use.
    async fn user_id(&self) -> Result<String, MediaServerError> {
        if let Some(id) = self.user_id.read().await.as_ref() {
            return Ok(id.clone());
        }
        let id = self.resolve_admin().await?;
        *self.user_id.write().await = Some(id.clone());
        Ok(id)
    }

    async fn resolve_admin(&self) -> Result<String, MediaServerError> {
        let users: Vec<User> = ServerHttp::json(self.http.get("/Users")).await?;
        let admin = first_admin(&users).ok_or_else(|| {
            MediaServerError::Unexpected("No administrator user on the server".into())
        })?;
        tracing::info!(user = %admin.name, "Using administrator account for library access");
        Ok(admin.id.clone())
    }

    async fn items(&self, request: reqwest::RequestBuilder) -> Result<ItemsPage, MediaServerError> {
        ServerHttp::json(request).await
    }

    /// Movies and shows inside a box set.
    async fn box_set_members(
        &self,
        user_id: &str,
        box_set_id: &str,
    ) -> Result<Vec<BaseItem>, MediaServerError> {
        let request = self
            .http
            .get(&format!("/Users/{user_id}/Items"))
            .query(&[("ParentId", box_set_id), ("Fields", ITEM_FIELDS)])
            .timeout(SCAN_TIMEOUT);
        Ok(self.items(request).await?.items)
    }

    async fn images(&self, item_id: &str) -> Result<Vec<ImageInfo>, MediaServerError> {
        ServerHttp::json(self.http.get(&format!("/Items/{item_id}/Images"))).await
    }

    async fn upload(
        &self,
        item_id: &str,
        kind: ArtworkKind,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), MediaServerError> {
        let body = base64::engine::general_purpose::STANDARD.encode(bytes);
        let request = self
            .http
            .request(
                Method::POST,
                &format!("/Items/{item_id}/Images/{}", Self::image_slot(kind)),
            )
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        ServerHttp::send(request).await?;
        Ok(())
    }

    /// Upload a backdrop and move it to the front of the backdrop list.
    async fn upload_primary_backdrop(
        &self,
        item_id: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), MediaServerError> {
        let before = backdrop_tags(&self.images(item_id).await?);
        self.upload(item_id, ArtworkKind::Backdrop, bytes, content_type)
            .await?;
        let after = backdrop_tags(&self.images(item_id).await?);

        match new_backdrop_index(&before, &after) {
            Some(0) => Ok(()),
            Some(index) => {
                let request = self
                    .http
                    .request(
                        Method::POST,
                        &format!("/Items/{item_id}/Images/Backdrop/{index}/Index"),
                    )
                    .query(&[("newIndex", "0")]);
                ServerHttp::send(request).await?;
                tracing::debug!(item_id, from = index, "Moved new backdrop to the front");
                Ok(())
            }
            None => {
                tracing::warn!(item_id, "Uploaded backdrop not found in image list");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl MediaServer for EmbyJellyfinServer {
    fn server_type(&self) -> MediaServerType {
        self.server_type
    }

    async fn get_status(&self) -> Result<String, MediaServerError> {
        let info: SystemInfo = ServerHttp::json(self.http.get("/System/Info")).await?;
        Ok(info.version)
    }

    async fn init_connection(&self) -> Result<(), MediaServerError> {
        let version = self.get_status().await?;
        let user_id = self.user_id().await?;
        tracing::info!(
            url = self.http.base_url(),
            server = self.server_type.as_str(),
            %version,
            %user_id,
            "Connected to media server"
        );
        Ok(())
    }

    async fn fetch_section_info(
        &self,
        library: &mut LibraryConfig,
    ) -> Result<bool, MediaServerError> {
        let folders: Vec<VirtualFolder> =
            ServerHttp::json(self.http.get("/Library/VirtualFolders")).await?;
        let Some(folder) = folders.into_iter().find(|f| f.name == library.name) else {
            return Ok(false);
        };
        library.section_id = folder.item_id;
        library.section_type = match folder.collection_type.as_str() {
            "tvshows" => "show".to_string(),
            "movies" => "movie".to_string(),
            other => other.to_string(),
        };
        if let Some(path) = folder.locations.into_iter().next() {
            library.path = path;
        }
        Ok(true)
    }

    async fn list_sections(&self) -> Result<Vec<String>, MediaServerError> {
        let folders: Vec<VirtualFolder> =
            ServerHttp::json(self.http.get("/Library/VirtualFolders")).await?;
        Ok(folders.into_iter().map(|f| f.name).collect())
    }

    async fn fetch_section_items(
        &self,
        section: &LibrarySection,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<MediaItem>, usize), MediaServerError> {
        let user_id = self.user_id().await?;
        let start = offset.to_string();
        let limit = limit.to_string();
        let request = self
            .http
            .get(&format!("/Users/{user_id}/Items"))
            .query(&[
                ("ParentId", section.id.as_str()),
                ("StartIndex", start.as_str()),
                ("Limit", limit.as_str()),
                ("Fields", ITEM_FIELDS),
            ])
            .timeout(SCAN_TIMEOUT);
        let page = self.items(request).await?;

        let mut items = Vec::with_capacity(page.items.len());
        for entry in &page.items {
            if entry.is_box_set() {
                let members = self.box_set_members(&user_id, &entry.id).await?;
                items.extend(
                    members
                        .iter()
                        .filter_map(|member| to_media_item(member, &section.title)),
                );
            } else if let Some(item) = to_media_item(entry, &section.title) {
                items.push(item);
            }
        }
        Ok((items, page.total_record_count))
    }

    async fn fetch_item_content(
        &self,
        rating_key: &str,
        section_title: &str,
    ) -> Result<MediaItem, MediaServerError> {
        let user_id = self.user_id().await?;
        let request = self
            .http
            .get(&format!("/Users/{user_id}/Items/{rating_key}"))
            .query(&[("Fields", ITEM_FIELDS)]);
        let entry: BaseItem = ServerHttp::json(request).await?;
        let mut item = to_media_item(&entry, section_title).ok_or_else(|| {
            MediaServerError::Unexpected(format!(
                "Item {rating_key} is a {}, not a movie or series",
                entry.item_type
            ))
        })?;

        if item.media_type == MediaType::Show {
            let seasons = self
                .items(
                    self.http
                        .get(&format!("/Shows/{rating_key}/Seasons"))
                        .query(&[("UserId", user_id.as_str()), ("Fields", ITEM_FIELDS)]),
                )
                .await?;
            let episodes = self
                .items(
                    self.http
                        .get(&format!("/Shows/{rating_key}/Episodes"))
                        .query(&[("UserId", user_id.as_str()), ("Fields", ITEM_FIELDS)]),
                )
                .await?;
            item.series = Some(build_series(
                &seasons.items,
                &episodes.items,
                entry.path.clone(),
            ));
        }
        Ok(item)
    }

    async fn fetch_image(
        &self,
        rating_key: &str,
        kind: ArtworkKind,
    ) -> Result<Vec<u8>, MediaServerError> {
        let request = self
            .http
            .get(&format!(
                "/Items/{rating_key}/Images/{}",
                Self::image_slot(kind)
            ))
            .header(reqwest::header::ACCEPT, "image/*");
        ServerHttp::bytes(request).await
    }

    async fn apply_image(&self, image: &ApplyImage<'_>) -> Result<(), MediaServerError> {
        match ArtworkKind::from(image.image_type) {
            ArtworkKind::Backdrop => {
                self.upload_primary_backdrop(image.rating_key, image.bytes, image.content_type)
                    .await
            }
            ArtworkKind::Poster => {
                self.upload(
                    image.rating_key,
                    ArtworkKind::Poster,
                    image.bytes,
                    image.content_type,
                )
                .await
            }
        }
    }

    async fn refresh_item(&self, rating_key: &str) -> Result<(), MediaServerError> {
        let request = self
            .http
            .request(Method::POST, &format!("/Items/{rating_key}/Refresh"))
            .query(&[
                ("MetadataRefreshMode", "Default"),
                ("ImageRefreshMode", "Default"),
                ("ReplaceAllImages", "false"),
            ]);
        ServerHttp::send(request).await?;
        Ok(())
    }

    async fn rate_item(&self, rating_key: &str, _score: f32) -> Result<(), MediaServerError> {
        tracing::debug!(rating_key, "Rating is not supported on this server type");
        Ok(())
    }

    async fn apply_labels(
        &self,
        rating_key: &str,
        _add: &[String],
        _remove: &[String],
    ) -> Result<(), MediaServerError> {
        tracing::debug!(rating_key, "Labels are not supported on this server type");
        Ok(())
    }
}
