//! Sonarr/Radarr v3 client, used to mirror aura labels as tags.

use aura_core::config::{ArrApplication, ArrType};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MediaServerError;
use crate::http::ServerHttp;

const API_KEY_HEADER: &str = "X-Api-Key";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrTag {
    #[serde(default)]
    pub id: i64,
    pub label: String,
}

#[derive(Debug, Deserialize)]
struct SystemStatus {
    #[serde(default)]
    version: String,
}

#[derive(Debug, Deserialize)]
struct LookupEntry {
    #[serde(default)]
    id: i64,
}

/// One configured Sonarr or Radarr instance.
pub struct ArrClient {
    http: ServerHttp,
    app_type: ArrType,
    library: String,
}

impl ArrClient {
    pub fn new(app: &ArrApplication) -> Result<Self, MediaServerError> {
        Ok(Self {
            http: ServerHttp::new(&app.url, API_KEY_HEADER, &app.api_key)?,
            app_type: app.app_type,
            library: app.library.clone(),
        })
    }

    /// Library section this instance manages.
    pub fn library(&self) -> &str {
        &self.library
    }

    pub fn app_type(&self) -> ArrType {
        self.app_type
    }

    fn resource(&self) -> &'static str {
        match self.app_type {
            ArrType::Sonarr => "series",
            ArrType::Radarr => "movie",
        }
    }

    pub async fn status(&self) -> Result<String, MediaServerError> {
        let status: SystemStatus =
            ServerHttp::json(self.http.get("/api/v3/system/status")).await?;
        Ok(status.version)
    }

    /// Id of the library entry for a TMDB id, if the instance tracks it.
    pub async fn lookup(&self, tmdb_id: &str) -> Result<Option<i64>, MediaServerError> {
        let term = format!("tmdb:{tmdb_id}");
        let request = self
            .http
            .get(&format!("/api/v3/{}/lookup", self.resource()))
            .query(&[("term", term.as_str())]);
        let entries: Vec<LookupEntry> = ServerHttp::json(request).await?;
        Ok(entries.into_iter().map(|e| e.id).find(|id| *id > 0))
    }

    pub async fn tags(&self) -> Result<Vec<ArrTag>, MediaServerError> {
        ServerHttp::json(self.http.get("/api/v3/tag")).await
    }

    async fn create_tag(&self, label: &str) -> Result<ArrTag, MediaServerError> {
        let request = self
            .http
            .request(Method::POST, "/api/v3/tag")
            .json(&ArrTag {
                id: 0,
                label: label.to_string(),
            });
        ServerHttp::json(request).await
    }

    /// Add and remove tags on the entry for `tmdb_id`. Missing tags are
    /// created; an untracked item is left alone.
    pub async fn update_tags(
        &self,
        tmdb_id: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<(), MediaServerError> {
        let Some(id) = self.lookup(tmdb_id).await? else {
            tracing::debug!(tmdb_id, app = ?self.app_type, "Not tracked, skipping tags");
            return Ok(());
        };

        let mut known = self.tags().await?;
        let mut add_ids = Vec::with_capacity(add.len());
        for label in add.iter().map(|l| l.to_lowercase()) {
            match known.iter().find(|t| t.label.eq_ignore_ascii_case(&label)) {
                Some(tag) => add_ids.push(tag.id),
                None => {
                    let tag = self.create_tag(&label).await?;
                    add_ids.push(tag.id);
                    known.push(tag);
                }
            }
        }
        let remove_ids: Vec<i64> = known
            .iter()
            .filter(|t| remove.iter().any(|r| r.eq_ignore_ascii_case(&t.label)))
            .map(|t| t.id)
            .collect();

        let path = format!("/api/v3/{}/{id}", self.resource());
        let mut entry: Value = ServerHttp::json(self.http.get(&path)).await?;
        let current: Vec<i64> = entry
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default();
        let merged = merge_tags(&current, &add_ids, &remove_ids);
        if merged == current {
            return Ok(());
        }
        entry["tags"] = Value::from(merged);
        ServerHttp::send(self.http.request(Method::PUT, &path).json(&entry)).await?;
        Ok(())
    }
}

/// `current - remove + add`, keeping the original order and no duplicates.
fn merge_tags(current: &[i64], add: &[i64], remove: &[i64]) -> Vec<i64> {
    let mut merged: Vec<i64> = current
        .iter()
        .copied()
        .filter(|id| !remove.contains(id))
        .collect();
    for id in add {
        if !merged.contains(id) {
            merged.push(*id);
        }
    }
    merged
}
