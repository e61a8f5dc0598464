//! Shared HTTP plumbing: base URL, auth header, status mapping.

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::error::MediaServerError;

/// Default per-request budget.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Budget for full section scans.
pub(crate) const SCAN_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Clone)]
pub(crate) struct ServerHttp {
    client: reqwest::Client,
    base_url: String,
    token_header: &'static str,
    token: String,
}

impl ServerHttp {
    pub(crate) fn new(
        base_url: &str,
        token_header: &'static str,
        token: &str,
    ) -> Result<Self, MediaServerError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token_header,
            token: token.to_string(),
        })
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Authenticated request for `path` (which starts with `/`).
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header(self.token_header, &self.token)
            .header(ACCEPT, "application/json")
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    /// Send and require a 2xx status.
    pub(crate) async fn send(request: RequestBuilder) -> Result<Response, MediaServerError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().path().to_string();
        match status.as_u16() {
            401 | 403 => Err(MediaServerError::Unauthorized {
                status: status.as_u16(),
            }),
            404 => Err(MediaServerError::NotFound(url)),
            code => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<unreadable body>".to_string());
                Err(MediaServerError::Api { status: code, body })
            }
        }
    }

    /// Send, require 2xx, decode JSON.
    pub(crate) async fn json<T: DeserializeOwned>(
        request: RequestBuilder,
    ) -> Result<T, MediaServerError> {
        let response = Self::send(request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub(crate) async fn bytes(request: RequestBuilder) -> Result<Vec<u8>, MediaServerError> {
        let response = Self::send(request).await?;
        Ok(response.bytes().await?.to_vec())
    }
}
