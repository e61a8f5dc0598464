use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok` when every dependency answers, `degraded` otherwise.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub db_healthy: bool,
    pub media_server: MediaServerHealth,
}

#[derive(Serialize)]
pub struct MediaServerHealth {
    #[serde(rename = "type")]
    pub server_type: &'static str,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Library sections currently held in the cache.
    pub cached_libraries: usize,
}

/// GET /health -- database and media-server reachability.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = aura_db::health_check(&state.pool).await.is_ok();
    let version = match state.media_server.get_status().await {
        Ok(version) => Some(version),
        Err(e) => {
            tracing::warn!(error = %e, "Media server health check failed");
            None
        }
    };
    let reachable = version.is_some();
    let cached_libraries = state.cache.list_sorted_by_title().await.len();

    Json(HealthResponse {
        status: if db_healthy && reachable { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        media_server: MediaServerHealth {
            server_type: state.media_server.server_type().as_str(),
            reachable,
            version,
            cached_libraries,
        },
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
