//! Row types for the subscription store tables and their conversion into
//! domain types.

use aura_core::media::{Guid, MediaItem, MediaType, Movie, Series};
use aura_core::poster::{PosterSet, SelectedTypes};
use aura_core::subscription::Subscription;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::FromRow;

use crate::error::DbError;

/// Column list for `MediaItems`, aliased to the [`ItemRow`] field names.
pub const ITEM_COLUMNS: &str = "m.TMDB_ID AS tmdb_id, m.LibraryTitle AS library_title, \
    m.RatingKey AS rating_key, m.Type AS media_type, m.Title AS title, m.Year AS year, \
    m.Thumb AS thumb, m.ContentRating AS content_rating, m.Summary AS summary, \
    m.UpdatedAt AS updated_at, m.AddedAt AS added_at, m.ReleasedAt AS released_at, \
    m.Guids_JSON AS guids_json, m.Movie_JSON AS movie_json, m.Series_JSON AS series_json, \
    m.Full_JSON AS full_json, m.Ignored AS ignored";

/// Column list for `PosterSets`, aliased to the [`SubscriptionRow`] field names.
pub const SUBSCRIPTION_COLUMNS: &str = "ps.PosterSetID AS poster_set_id, \
    ps.PosterSetUser AS poster_set_user, ps.PosterSet_JSON AS poster_set_json, \
    ps.LastDownloaded AS last_downloaded, ps.SelectedTypes AS selected_types, \
    ps.AutoDownload AS auto_download";

/// A row from the `MediaItems` table.
#[derive(Debug, Clone, FromRow)]
pub struct ItemRow {
    pub tmdb_id: String,
    pub library_title: String,
    pub rating_key: Option<String>,
    pub media_type: Option<String>,
    pub title: Option<String>,
    pub year: Option<i64>,
    pub thumb: Option<String>,
    pub content_rating: Option<String>,
    pub summary: Option<String>,
    pub updated_at: Option<i64>,
    pub added_at: Option<i64>,
    pub released_at: Option<i64>,
    pub guids_json: Option<String>,
    pub movie_json: Option<String>,
    pub series_json: Option<String>,
    pub full_json: Option<String>,
    pub ignored: bool,
}

/// A row from the `PosterSets` table. Every field is optional so the row can
/// come from the right side of a `LEFT JOIN`.
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionRow {
    pub poster_set_id: Option<String>,
    pub poster_set_user: Option<String>,
    pub poster_set_json: Option<String>,
    pub last_downloaded: Option<String>,
    pub selected_types: Option<String>,
    pub auto_download: Option<bool>,
}

/// `MediaItems LEFT JOIN PosterSets`.
#[derive(Debug, Clone, FromRow)]
pub struct JoinedRow {
    #[sqlx(flatten)]
    pub item: ItemRow,
    #[sqlx(flatten)]
    pub subscription: SubscriptionRow,
}

fn parse_json<T: DeserializeOwned>(column: &'static str, value: &str) -> Result<T, DbError> {
    serde_json::from_str(value).map_err(|e| DbError::json(column, e))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

impl ItemRow {
    /// Decode the stored item. `Full_JSON` is preferred; when it has been
    /// cleared the item is rebuilt from the scalar and JSON projections.
    pub fn into_media_item(self) -> Result<MediaItem, DbError> {
        let mut item = match non_empty(&self.full_json) {
            Some(full) => parse_json::<MediaItem>("Full_JSON", full)?,
            None => self.rebuild()?,
        };
        item.tmdb_id = self.tmdb_id;
        item.library_title = self.library_title;
        Ok(item)
    }

    fn rebuild(&self) -> Result<MediaItem, DbError> {
        let guids: Vec<Guid> = match non_empty(&self.guids_json) {
            Some(v) => parse_json("Guids_JSON", v)?,
            None => Vec::new(),
        };
        let movie: Option<Movie> = match non_empty(&self.movie_json) {
            Some(v) => Some(parse_json("Movie_JSON", v)?),
            None => None,
        };
        let series: Option<Series> = match non_empty(&self.series_json) {
            Some(v) => Some(parse_json("Series_JSON", v)?),
            None => None,
        };
        let media_type = match self.media_type.as_deref() {
            Some("show") => MediaType::Show,
            _ => MediaType::Movie,
        };
        Ok(MediaItem {
            tmdb_id: self.tmdb_id.clone(),
            library_title: self.library_title.clone(),
            rating_key: self.rating_key.clone().unwrap_or_default(),
            media_type,
            title: self.title.clone().unwrap_or_default(),
            year: self.year.unwrap_or_default() as i32,
            thumb: self.thumb.clone().unwrap_or_default(),
            content_rating: self.content_rating.clone().unwrap_or_default(),
            summary: self.summary.clone().unwrap_or_default(),
            updated_at: self.updated_at.unwrap_or_default(),
            added_at: self.added_at.unwrap_or_default(),
            released_at: self.released_at.unwrap_or_default(),
            guids,
            movie,
            series,
        })
    }
}

impl SubscriptionRow {
    /// `None` when the row is the empty side of a `LEFT JOIN`.
    pub fn into_subscription(self) -> Result<Option<Subscription>, DbError> {
        let Some(id) = self.poster_set_id.filter(|id| !id.is_empty()) else {
            return Ok(None);
        };
        let mut poster_set: PosterSet = match non_empty(&self.poster_set_json) {
            Some(json) => parse_json("PosterSet_JSON", json)?,
            None => PosterSet::default(),
        };
        poster_set.id = id;
        if poster_set.user.name.is_empty() {
            poster_set.user.name = self.poster_set_user.unwrap_or_default();
        }
        Ok(Some(Subscription {
            poster_set,
            selected_types: SelectedTypes::from_csv(self.selected_types.as_deref().unwrap_or("")),
            auto_download: self.auto_download.unwrap_or(false),
            last_downloaded: self.last_downloaded.unwrap_or_default(),
        }))
    }
}

/// JSON projections written alongside the scalar columns of `MediaItems`.
pub struct ItemProjection {
    pub guids_json: String,
    pub movie_json: Option<String>,
    pub series_json: Option<String>,
    pub full_json: String,
}

impl ItemProjection {
    pub fn of(item: &MediaItem) -> Result<Self, DbError> {
        Ok(Self {
            guids_json: to_json("Guids_JSON", &item.guids)?,
            movie_json: item
                .movie
                .as_ref()
                .map(|m| to_json("Movie_JSON", m))
                .transpose()?,
            series_json: item
                .series
                .as_ref()
                .map(|s| to_json("Series_JSON", s))
                .transpose()?,
            full_json: to_json("Full_JSON", item)?,
        })
    }
}

pub(crate) fn to_json<T: Serialize>(column: &'static str, value: &T) -> Result<String, DbError> {
    serde_json::to_string(value).map_err(|e| DbError::json(column, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_item_row() -> ItemRow {
        ItemRow {
            tmdb_id: "1399".into(),
            library_title: "TV".into(),
            rating_key: Some("100".into()),
            media_type: Some("show".into()),
            title: Some("Game of Thrones".into()),
            year: Some(2011),
            thumb: None,
            content_rating: None,
            summary: None,
            updated_at: None,
            added_at: None,
            released_at: None,
            guids_json: None,
            movie_json: None,
            series_json: Some(r#"{"seasons":[],"season_count":0,"episode_count":0,"location":"/tv/got"}"#.into()),
            full_json: None,
            ignored: false,
        }
    }

    #[test]
    fn rebuilds_item_when_full_json_cleared() {
        let item = empty_item_row().into_media_item().expect("decodes");
        assert_eq!(item.media_type, MediaType::Show);
        assert_eq!(item.year, 2011);
        assert_eq!(item.series.map(|s| s.location), Some("/tv/got".to_string()));
    }

    #[test]
    fn key_columns_override_json() {
        let mut row = empty_item_row();
        row.full_json = Some(r#"{"tmdb_id":"wrong","library_title":"wrong","type":"show"}"#.into());
        let item = row.into_media_item().expect("decodes");
        assert_eq!(item.tmdb_id, "1399");
        assert_eq!(item.library_title, "TV");
    }

    #[test]
    fn empty_join_side_is_none() {
        let row = SubscriptionRow {
            poster_set_id: None,
            poster_set_user: None,
            poster_set_json: None,
            last_downloaded: None,
            selected_types: None,
            auto_download: None,
        };
        assert!(row.into_subscription().expect("decodes").is_none());
    }

    #[test]
    fn malformed_set_json_names_column() {
        let row = SubscriptionRow {
            poster_set_id: Some("1".into()),
            poster_set_user: None,
            poster_set_json: Some("{".into()),
            last_downloaded: None,
            selected_types: Some("poster".into()),
            auto_download: Some(true),
        };
        let err = row.into_subscription().expect_err("malformed");
        assert!(err.to_string().contains("PosterSet_JSON"));
    }
}
