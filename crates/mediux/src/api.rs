//! HTTP client for the MediUX GraphQL and asset endpoints.
//!
//! Every request carries `Authorization: Bearer <token>` and the shared
//! 60 second budget configured on the underlying [`reqwest::Client`].

use std::time::Duration;

use aura_core::time::cache_buster;
use aura_core::types::Timestamp;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::MediuxError;
use crate::images::{ImageData, ImageQuality};

/// Public MediUX host.
pub const DEFAULT_BASE_URL: &str = "https://images.mediux.io";

/// Default per-request budget.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Authenticated client for one MediUX account.
#[derive(Clone)]
pub struct MediuxApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: serde_json::Value,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlErrorEntry>,
}

#[derive(Deserialize)]
struct GraphQlErrorEntry {
    message: String,
}

impl MediuxApi {
    /// Client against the public MediUX host.
    pub fn new(token: impl Into<String>) -> Result<Self, MediuxError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, MediuxError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(client, base_url, token))
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn token(&self) -> &str {
        &self.token
    }

    /// Run a GraphQL query and decode its `data` member.
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, MediuxError> {
        let response = self
            .client
            .post(format!("{}/graphql", self.base_url))
            .bearer_auth(&self.token)
            .json(&GraphQlRequest { query, variables })
            .send()
            .await?;

        let body: GraphQlResponse<T> = Self::parse_response(response).await?;
        if !body.errors.is_empty() {
            let messages: Vec<_> = body.errors.into_iter().map(|e| e.message).collect();
            return Err(MediuxError::GraphQl(messages.join("; ")));
        }
        body.data
            .ok_or_else(|| MediuxError::GraphQl("response carried no data".to_string()))
    }

    /// `GET /users/me`: `true` on 200, `false` when the token is rejected.
    pub async fn validate_token(&self) -> Result<bool, MediuxError> {
        let response = self
            .client
            .get(format!("{}/users/me", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;

        match Self::ensure_success(response).await {
            Ok(_) => Ok(true),
            Err(MediuxError::Unauthorized { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// URL of an asset rendition. `modified` becomes the `v` cache-buster.
    pub fn asset_url(&self, asset_id: &str, modified: &Timestamp, quality: ImageQuality) -> String {
        let mut url = format!(
            "{}/assets/{}?v={}",
            self.base_url,
            asset_id,
            cache_buster(modified)
        );
        if let Some(key) = quality.key() {
            url.push_str("&key=");
            url.push_str(key);
        }
        url
    }

    /// Download one asset rendition.
    pub async fn fetch_asset(
        &self,
        asset_id: &str,
        modified: &Timestamp,
        quality: ImageQuality,
    ) -> Result<ImageData, MediuxError> {
        let response = self
            .client
            .get(self.asset_url(asset_id, modified, quality))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = response.bytes().await?;

        tracing::debug!(asset_id, quality = ?quality, size = bytes.len(), "Fetched MediUX asset");
        Ok(ImageData {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    // ---- private helpers ----

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, MediuxError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if matches!(status.as_u16(), 401 | 403) {
            return Err(MediuxError::Unauthorized {
                status: status.as_u16(),
            });
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(MediuxError::Api {
            status: status.as_u16(),
            body,
        })
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, MediuxError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
