//! Shared helpers for the HTTP integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use aura_api::config::ServerConfig;
use aura_api::router::build_app_router;
use aura_api::state::AppState;
use aura_core::config::{LibraryConfig, MediaServerType};
use aura_core::library_cache::{LibraryCache, LibrarySection};
use aura_core::media::MediaItem;
use aura_mediaserver::{ApplyImage, ArtworkKind, MediaServer, MediaServerError};
use http_body_util::BodyExt;
use tower::ServiceExt;

/// Media server that answers the status check and nothing else.
pub struct StubServer {
    pub reachable: bool,
}

#[async_trait]
impl MediaServer for StubServer {
    fn server_type(&self) -> MediaServerType {
        MediaServerType::Jellyfin
    }

    async fn get_status(&self) -> Result<String, MediaServerError> {
        if self.reachable {
            Ok("10.9.0".into())
        } else {
            Err(MediaServerError::NotFound("system/info".into()))
        }
    }

    async fn init_connection(&self) -> Result<(), MediaServerError> {
        Ok(())
    }

    async fn fetch_section_info(&self, _library: &mut LibraryConfig) -> Result<bool, MediaServerError> {
        Ok(false)
    }

    async fn list_sections(&self) -> Result<Vec<String>, MediaServerError> {
        Ok(vec![])
    }

    async fn fetch_section_items(
        &self,
        _section: &LibrarySection,
        _offset: usize,
        _limit: usize,
    ) -> Result<(Vec<MediaItem>, usize), MediaServerError> {
        Ok((vec![], 0))
    }

    async fn fetch_item_content(
        &self,
        rating_key: &str,
        _section_title: &str,
    ) -> Result<MediaItem, MediaServerError> {
        Err(MediaServerError::NotFound(rating_key.to_string()))
    }

    async fn fetch_image(&self, rating_key: &str, _kind: ArtworkKind) -> Result<Vec<u8>, MediaServerError> {
        Err(MediaServerError::NotFound(rating_key.to_string()))
    }

    async fn apply_image(&self, _image: &ApplyImage<'_>) -> Result<(), MediaServerError> {
        Ok(())
    }

    async fn refresh_item(&self, _rating_key: &str) -> Result<(), MediaServerError> {
        Ok(())
    }

    async fn rate_item(&self, _rating_key: &str, _score: f32) -> Result<(), MediaServerError> {
        Ok(())
    }

    async fn apply_labels(&self, _rk: &str, _add: &[String], _remove: &[String]) -> Result<(), MediaServerError> {
        Ok(())
    }
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
    }
}

/// Full router over an in-memory database and a stub media server.
pub async fn build_test_app(reachable: bool) -> Router {
    let pool = aura_db::create_memory_pool().await.unwrap();
    let cache = Arc::new(LibraryCache::new());
    cache.upsert_section(LibrarySection::new("Movies")).await;

    build_app_router(AppState {
        pool,
        config: Arc::new(test_config()),
        media_server: Arc::new(StubServer { reachable }),
        cache,
    })
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
