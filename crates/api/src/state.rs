use std::sync::Arc;

use aura_core::library_cache::LibraryCache;
use aura_mediaserver::MediaServer;

use crate::config::ServerConfig;

/// Shared state available to handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub pool: aura_db::DbPool,
    pub config: Arc<ServerConfig>,
    pub media_server: Arc<dyn MediaServer>,
    pub cache: Arc<LibraryCache>,
}
