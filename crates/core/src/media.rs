//! Media-server side of the data model: items, seasons, episodes, files.
//!
//! A [`MediaItem`] is identified by `(tmdb_id, library_title)`; its
//! `rating_key` is the server's own handle and may change on re-import.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::poster::{ImageType, PosterFile};
use crate::types::ItemKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Movie,
    Show,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Show => "show",
        }
    }
}

/// An external identifier reported by the media server (e.g. `tmdb://1399`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Guid {
    pub provider: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MediaFile {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub duration: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Movie {
    #[serde(default)]
    pub file: MediaFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Episode {
    pub season_number: i32,
    pub episode_number: i32,
    #[serde(default)]
    pub rating_key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub file: MediaFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Season {
    pub season_number: i32,
    #[serde(default)]
    pub rating_key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Series {
    #[serde(default)]
    pub seasons: Vec<Season>,
    #[serde(default)]
    pub season_count: i32,
    #[serde(default)]
    pub episode_count: i32,
    #[serde(default)]
    pub location: String,
}

impl Series {
    /// Build a series from its seasons, deriving the counts.
    pub fn from_seasons(seasons: Vec<Season>, location: impl Into<String>) -> Self {
        let season_count = seasons.len() as i32;
        let episode_count = seasons.iter().map(|s| s.episodes.len() as i32).sum();
        Self {
            seasons,
            season_count,
            episode_count,
            location: location.into(),
        }
    }
}

/// A movie or show in one library section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MediaItem {
    #[serde(default)]
    pub tmdb_id: String,
    #[serde(default)]
    pub library_title: String,
    #[serde(default)]
    pub rating_key: String,
    #[serde(default, rename = "type")]
    pub media_type: MediaType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub thumb: String,
    #[serde(default)]
    pub content_rating: String,
    #[serde(default)]
    pub summary: String,
    /// Unix seconds.
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default)]
    pub added_at: i64,
    #[serde(default)]
    pub released_at: i64,
    #[serde(default)]
    pub guids: Vec<Guid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movie: Option<Movie>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<Series>,
}

impl MediaItem {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.tmdb_id.clone(), self.library_title.clone())
    }

    /// Check the structural invariants an item must hold before it may be
    /// persisted alongside a subscription.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.tmdb_id.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "Media item '{}' has no TMDB id",
                self.title
            )));
        }
        if self.library_title.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "Media item '{}' has no library title",
                self.title
            )));
        }
        match self.media_type {
            MediaType::Show if self.series.is_none() => Err(CoreError::Validation(format!(
                "Show '{}' has no series data",
                self.title
            ))),
            MediaType::Movie if self.movie.is_none() => Err(CoreError::Validation(format!(
                "Movie '{}' has no movie data",
                self.title
            ))),
            _ => Ok(()),
        }
    }

    /// File path of a movie, if any.
    pub fn movie_path(&self) -> Option<&str> {
        self.movie.as_ref().map(|m| m.file.path.as_str())
    }

    pub fn season(&self, number: i32) -> Option<&Season> {
        self.series
            .as_ref()?
            .seasons
            .iter()
            .find(|s| s.season_number == number)
    }

    pub fn episode(&self, season_number: i32, episode_number: i32) -> Option<&Episode> {
        self.season(season_number)?
            .episodes
            .iter()
            .find(|e| e.episode_number == episode_number)
    }

    pub fn season_count(&self) -> i32 {
        self.series.as_ref().map(|s| s.season_count).unwrap_or(0)
    }

    pub fn episode_count(&self) -> i32 {
        self.series.as_ref().map(|s| s.episode_count).unwrap_or(0)
    }

    /// TMDB id taken from the `tmdb` guid, if the server reported one.
    pub fn tmdb_from_guids(&self) -> Option<&str> {
        self.guids
            .iter()
            .find(|g| g.provider.eq_ignore_ascii_case("tmdb") && !g.id.is_empty())
            .map(|g| g.id.as_str())
    }

    /// Resolve the rating key of the slot a poster file targets.
    ///
    /// Posters and backdrops land on the item itself, season posters on the
    /// matching season, title cards on the matching episode. Returns `None`
    /// when the item does not (yet) hold that season or episode.
    pub fn target_rating_key(&self, file: &PosterFile) -> Option<String> {
        match file.image_type {
            ImageType::Poster | ImageType::Backdrop => Some(self.rating_key.clone()),
            ImageType::SeasonPoster | ImageType::SpecialSeasonPoster => {
                let number = file.season_number()?;
                self.season(number).map(|s| s.rating_key.clone())
            }
            ImageType::Titlecard => {
                let (season, episode) = file.episode_numbers()?;
                self.episode(season, episode).map(|e| e.rating_key.clone())
            }
        }
        .filter(|key| !key.is_empty())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn show(tmdb_id: &str, library: &str, rating_key: &str, seasons: &[i32]) -> MediaItem {
        let seasons = seasons
            .iter()
            .map(|&n| Season {
                season_number: n,
                rating_key: format!("{rating_key}-s{n}"),
                title: format!("Season {n}"),
                episodes: vec![Episode {
                    season_number: n,
                    episode_number: 1,
                    rating_key: format!("{rating_key}-s{n}e1"),
                    title: "Pilot".into(),
                    file: MediaFile {
                        path: format!("/tv/Show/Season {n:02}/Show - S{n:02}E01.mkv"),
                        size: 1,
                        duration: 1,
                    },
                }],
            })
            .collect();
        MediaItem {
            tmdb_id: tmdb_id.into(),
            library_title: library.into(),
            rating_key: rating_key.into(),
            media_type: MediaType::Show,
            title: "Show".into(),
            year: 2011,
            series: Some(Series::from_seasons(seasons, "/tv/Show")),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::show;
    use super::*;
    use crate::poster::{EpisodeRef, SeasonRef};

    fn file(image_type: ImageType) -> PosterFile {
        PosterFile {
            id: "asset".into(),
            image_type,
            ..Default::default()
        }
    }

    #[test]
    fn validate_requires_tmdb_and_series_for_shows() {
        let mut item = show("1399", "TV", "100", &[1]);
        assert!(item.validate().is_ok());

        item.series = None;
        assert!(item.validate().is_err());

        let mut item = show("", "TV", "100", &[1]);
        item.tmdb_id = " ".into();
        assert!(item.validate().is_err());
    }

    #[test]
    fn from_seasons_derives_counts() {
        let item = show("1399", "TV", "100", &[1, 2, 3]);
        assert_eq!(item.season_count(), 3);
        assert_eq!(item.episode_count(), 3);
    }

    #[test]
    fn target_rating_key_resolves_slots() {
        let item = show("1399", "TV", "100", &[1, 2]);

        assert_eq!(item.target_rating_key(&file(ImageType::Poster)).as_deref(), Some("100"));

        let mut season = file(ImageType::SeasonPoster);
        season.season = Some(SeasonRef { number: 2 });
        assert_eq!(item.target_rating_key(&season).as_deref(), Some("100-s2"));

        let mut missing = file(ImageType::SeasonPoster);
        missing.season = Some(SeasonRef { number: 3 });
        assert_eq!(item.target_rating_key(&missing), None);

        let mut card = file(ImageType::Titlecard);
        card.episode = Some(EpisodeRef {
            title: "Pilot".into(),
            season_number: 1,
            episode_number: 1,
        });
        assert_eq!(item.target_rating_key(&card).as_deref(), Some("100-s1e1"));
    }

    #[test]
    fn tmdb_from_guids_is_case_insensitive() {
        let item = MediaItem {
            guids: vec![
                Guid { provider: "imdb".into(), id: "tt0944947".into(), rating: None },
                Guid { provider: "TMDB".into(), id: "1399".into(), rating: None },
            ],
            ..Default::default()
        };
        assert_eq!(item.tmdb_from_guids(), Some("1399"));
    }
}
