//! Plex JSON payloads and their mapping onto the aura model.

use aura_core::media::{Episode, Guid, MediaFile, MediaItem, MediaType, Movie, Season, Series};
use chrono::{NaiveDate, TimeZone, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    #[serde(rename = "MediaContainer")]
    pub container: Container,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct Container {
    pub version: Option<String>,
    pub size: Option<usize>,
    pub total_size: Option<usize>,
    #[serde(rename = "Metadata")]
    pub metadata: Vec<Metadata>,
    #[serde(rename = "Directory")]
    pub directory: Vec<Directory>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Directory {
    pub key: String,
    pub title: String,
    #[serde(rename = "type")]
    pub section_type: String,
    #[serde(rename = "Location")]
    pub location: Vec<Location>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Location {
    pub path: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct PlexGuid {
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Part {
    pub file: String,
    pub size: i64,
    pub duration: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Media {
    #[serde(rename = "Part")]
    pub part: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct Metadata {
    pub rating_key: String,
    pub key: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub title: String,
    pub year: i32,
    pub thumb: String,
    pub content_rating: String,
    pub summary: String,
    pub updated_at: i64,
    pub added_at: i64,
    pub originally_available_at: String,
    pub index: i32,
    pub parent_index: i32,
    pub child_count: i32,
    pub leaf_count: i32,
    pub selected: bool,
    pub provider: String,
    #[serde(rename = "Guid")]
    pub guids: Vec<PlexGuid>,
    #[serde(rename = "Media")]
    pub media: Vec<Media>,
    #[serde(rename = "Location")]
    pub location: Vec<Location>,
}

impl Metadata {
    fn first_file(&self) -> MediaFile {
        self.media
            .iter()
            .flat_map(|m| m.part.iter())
            .next()
            .map(|p| MediaFile {
                path: p.file.clone(),
                size: p.size,
                duration: p.duration,
            })
            .unwrap_or_default()
    }

    fn location(&self) -> String {
        self.location
            .first()
            .map(|l| l.path.clone())
            .unwrap_or_default()
    }

    /// Local assets have `metadata://` keys.
    pub fn is_local_asset(&self) -> bool {
        self.rating_key.starts_with("metadata://")
            && (self.provider == "local" || self.rating_key.contains("local"))
    }
}

/// `tmdb://1399` → `Guid { provider: "tmdb", id: "1399" }`.
pub(crate) fn parse_guid(raw: &str) -> Option<Guid> {
    let (provider, id) = raw.split_once("://")?;
    if provider.is_empty() || id.is_empty() {
        return None;
    }
    Some(Guid {
        provider: provider.to_lowercase(),
        id: id.to_string(),
        rating: None,
    })
}

/// Unix seconds of a `YYYY-MM-DD` release date; 0 when absent.
pub(crate) fn release_timestamp(date: &str) -> i64 {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt).timestamp())
        .unwrap_or(0)
}

/// Item-level fields shared by section listings and full fetches. Returns
/// `None` for anything that is not a movie or show.
pub(crate) fn to_media_item(meta: &Metadata, library_title: &str) -> Option<MediaItem> {
    let media_type = match meta.item_type.as_str() {
        "movie" => MediaType::Movie,
        "show" => MediaType::Show,
        _ => return None,
    };
    let guids: Vec<Guid> = meta.guids.iter().filter_map(|g| parse_guid(&g.id)).collect();
    let mut item = MediaItem {
        library_title: library_title.to_string(),
        rating_key: meta.rating_key.clone(),
        media_type,
        title: meta.title.clone(),
        year: meta.year,
        thumb: meta.thumb.clone(),
        content_rating: meta.content_rating.clone(),
        summary: meta.summary.clone(),
        updated_at: meta.updated_at,
        added_at: meta.added_at,
        released_at: release_timestamp(&meta.originally_available_at),
        guids,
        ..Default::default()
    };
    item.tmdb_id = item.tmdb_from_guids().unwrap_or_default().to_string();

    match media_type {
        MediaType::Movie => {
            item.movie = Some(Movie {
                file: meta.first_file(),
            })
        }
        MediaType::Show => {
            item.series = Some(Series {
                seasons: Vec::new(),
                season_count: meta.child_count,
                episode_count: meta.leaf_count,
                location: meta.location(),
            })
        }
    }
    Some(item)
}

/// Assemble seasons from `/children` and episodes from `/allLeaves`.
pub(crate) fn build_series(seasons: &[Metadata], episodes: &[Metadata], location: String) -> Series {
    let seasons = seasons
        .iter()
        .filter(|s| s.item_type == "season")
        .map(|s| Season {
            season_number: s.index,
            rating_key: s.rating_key.clone(),
            title: s.title.clone(),
            episodes: episodes
                .iter()
                .filter(|e| e.item_type == "episode" && e.parent_index == s.index)
                .map(|e| Episode {
                    season_number: e.parent_index,
                    episode_number: e.index,
                    rating_key: e.rating_key.clone(),
                    title: e.title.clone(),
                    file: e.first_file(),
                })
                .collect(),
        })
        .collect();
    Series::from_seasons(seasons, location)
}
