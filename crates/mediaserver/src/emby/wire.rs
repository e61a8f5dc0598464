//! Emby/Jellyfin JSON payloads. Both servers share the same item schema.

use std::collections::HashMap;

use aura_core::media::{Episode, Guid, MediaFile, MediaItem, MediaType, Movie, Season, Series};
use aura_core::time::parse_rfc3339;
use serde::Deserialize;

/// Fields requested on every item listing.
pub(crate) const ITEM_FIELDS: &str = "ProviderIds,Path,DateCreated,PremiereDate,ProductionYear,\
OfficialRating,Overview,ChildCount,RecursiveItemCount,MediaSources";

/// Emby run-time ticks are 100ns.
const TICKS_PER_MILLI: i64 = 10_000;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct SystemInfo {
    pub version: String,
    pub server_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct UserPolicy {
    pub is_administrator: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct User {
    pub id: String,
    pub name: String,
    pub policy: UserPolicy,
}

/// First administrator in server order.
pub(crate) fn first_admin(users: &[User]) -> Option<&User> {
    users.iter().find(|u| u.policy.is_administrator)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct VirtualFolder {
    pub name: String,
    pub item_id: String,
    pub collection_type: String,
    pub locations: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct ItemsPage {
    pub items: Vec<BaseItem>,
    pub total_record_count: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct MediaSource {
    pub path: String,
    pub size: i64,
    pub run_time_ticks: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct BaseItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "Type")]
    pub item_type: String,
    pub production_year: i32,
    pub provider_ids: HashMap<String, String>,
    pub path: String,
    pub official_rating: String,
    pub overview: String,
    pub date_created: String,
    pub premiere_date: String,
    pub index_number: i32,
    pub parent_index_number: i32,
    pub child_count: i32,
    pub recursive_item_count: i32,
    pub run_time_ticks: i64,
    pub media_sources: Vec<MediaSource>,
}

impl BaseItem {
    pub fn is_box_set(&self) -> bool {
        self.item_type == "BoxSet"
    }

    fn file(&self) -> MediaFile {
        match self.media_sources.first() {
            Some(source) => MediaFile {
                path: if source.path.is_empty() {
                    self.path.clone()
                } else {
                    source.path.clone()
                },
                size: source.size,
                duration: source.run_time_ticks / TICKS_PER_MILLI,
            },
            None => MediaFile {
                path: self.path.clone(),
                size: 0,
                duration: self.run_time_ticks / TICKS_PER_MILLI,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct ImageInfo {
    pub image_type: String,
    pub image_index: Option<i32>,
    pub image_tag: String,
}

/// Tags of every backdrop, in index order.
pub(crate) fn backdrop_tags(images: &[ImageInfo]) -> Vec<(i32, String)> {
    let mut tags: Vec<(i32, String)> = images
        .iter()
        .filter(|i| i.image_type == "Backdrop")
        .map(|i| (i.image_index.unwrap_or(0), i.image_tag.clone()))
        .collect();
    tags.sort_by_key(|(index, _)| *index);
    tags
}

/// Index of the backdrop that appeared between two snapshots, if any.
pub(crate) fn new_backdrop_index(before: &[(i32, String)], after: &[(i32, String)]) -> Option<i32> {
    after
        .iter()
        .find(|(_, tag)| !before.iter().any(|(_, old)| old == tag))
        .map(|(index, _)| *index)
}

fn unix_seconds(value: &str) -> i64 {
    parse_rfc3339(value).map(|ts| ts.timestamp()).unwrap_or(0)
}

/// Map a listing entry onto a [`MediaItem`]. Anything other than a movie or
/// series yields `None`.
pub(crate) fn to_media_item(item: &BaseItem, library_title: &str) -> Option<MediaItem> {
    let media_type = match item.item_type.as_str() {
        "Movie" => MediaType::Movie,
        "Series" => MediaType::Show,
        _ => return None,
    };
    let mut guids: Vec<Guid> = item
        .provider_ids
        .iter()
        .filter(|(_, id)| !id.is_empty())
        .map(|(provider, id)| Guid {
            provider: provider.to_lowercase(),
            id: id.clone(),
            rating: None,
        })
        .collect();
    guids.sort_by(|a, b| a.provider.cmp(&b.provider));

    let mut media = MediaItem {
        library_title: library_title.to_string(),
        rating_key: item.id.clone(),
        media_type,
        title: item.name.clone(),
        year: item.production_year,
        thumb: format!("/Items/{}/Images/Primary", item.id),
        content_rating: item.official_rating.clone(),
        summary: item.overview.clone(),
        added_at: unix_seconds(&item.date_created),
        released_at: unix_seconds(&item.premiere_date),
        guids,
        ..Default::default()
    };
    media.tmdb_id = media.tmdb_from_guids().unwrap_or_default().to_string();

    match media_type {
        MediaType::Movie => media.movie = Some(Movie { file: item.file() }),
        MediaType::Show => {
            media.series = Some(Series {
                seasons: Vec::new(),
                season_count: item.child_count,
                episode_count: item.recursive_item_count,
                location: item.path.clone(),
            })
        }
    }
    Some(media)
}

/// Assemble a series from `/Shows/{id}/Seasons` and `/Shows/{id}/Episodes`.
pub(crate) fn build_series(seasons: &[BaseItem], episodes: &[BaseItem], location: String) -> Series {
    let seasons = seasons
        .iter()
        .map(|s| Season {
            season_number: s.index_number,
            rating_key: s.id.clone(),
            title: s.name.clone(),
            episodes: episodes
                .iter()
                .filter(|e| e.parent_index_number == s.index_number)
                .map(|e| Episode {
                    season_number: e.parent_index_number,
                    episode_number: e.index_number,
                    rating_key: e.id.clone(),
                    title: e.name.clone(),
                    file: e.file(),
                })
                .collect(),
        })
        .collect();
    Series::from_seasons(seasons, location)
}
