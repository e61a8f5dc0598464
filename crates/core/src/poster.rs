//! Upstream side of the data model: poster sets and their image files.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

/// Kind of image asset. Ordering is the canonical order used when a set of
/// types is rendered (CSV column, labels).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "camelCase")]
pub enum ImageType {
    #[default]
    Poster,
    Backdrop,
    SeasonPoster,
    SpecialSeasonPoster,
    Titlecard,
}

impl ImageType {
    pub const ALL: [ImageType; 5] = [
        ImageType::Poster,
        ImageType::Backdrop,
        ImageType::SeasonPoster,
        ImageType::SpecialSeasonPoster,
        ImageType::Titlecard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageType::Poster => "poster",
            ImageType::Backdrop => "backdrop",
            ImageType::SeasonPoster => "seasonPoster",
            ImageType::SpecialSeasonPoster => "specialSeasonPoster",
            ImageType::Titlecard => "titlecard",
        }
    }

    /// Backdrops are "art" on the server; everything else is a poster slot.
    pub fn is_backdrop(&self) -> bool {
        matches!(self, ImageType::Backdrop)
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::Validation(format!("Unknown image type: '{s}'")))
    }
}

/// The image types a subscription keeps in sync.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectedTypes(BTreeSet<ImageType>);

impl SelectedTypes {
    pub fn new(types: impl IntoIterator<Item = ImageType>) -> Self {
        Self(types.into_iter().collect())
    }

    pub fn contains(&self, image_type: ImageType) -> bool {
        self.0.contains(&image_type)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = ImageType> + '_ {
        self.0.iter().copied()
    }

    /// Types in `self` that are not in `other`.
    pub fn difference(&self, other: &SelectedTypes) -> SelectedTypes {
        SelectedTypes(self.0.difference(&other.0).copied().collect())
    }

    pub fn union(&self, other: &SelectedTypes) -> SelectedTypes {
        SelectedTypes(self.0.union(&other.0).copied().collect())
    }

    pub fn to_csv(&self) -> String {
        self.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(",")
    }

    /// Parse the stored CSV column. Unknown entries are dropped.
    pub fn from_csv(csv: &str) -> Self {
        Self(
            csv.split(',')
                .filter(|s| !s.trim().is_empty())
                .filter_map(|s| s.parse().ok())
                .collect(),
        )
    }
}

impl FromIterator<ImageType> for SelectedTypes {
    fn from_iter<I: IntoIterator<Item = ImageType>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SetKind {
    #[default]
    Show,
    Movie,
    Collection,
}

impl SetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetKind::Show => "show",
            SetKind::Movie => "movie",
            SetKind::Collection => "collection",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SeasonRef {
    pub number: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EpisodeRef {
    #[serde(default)]
    pub title: String,
    pub season_number: i32,
    pub episode_number: i32,
}

/// One image asset inside a poster set.
///
/// The owning media item is not referenced; callers resolve the slot
/// against the live item with [`crate::media::MediaItem::target_rating_key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PosterFile {
    pub id: String,
    #[serde(rename = "type")]
    pub image_type: ImageType,
    #[serde(default)]
    pub modified: Timestamp,
    #[serde(default)]
    pub file_size: i64,
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub blurhash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<SeasonRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<EpisodeRef>,
}

impl PosterFile {
    pub fn season_number(&self) -> Option<i32> {
        self.season
            .as_ref()
            .map(|s| s.number)
            .or_else(|| self.episode.as_ref().map(|e| e.season_number))
    }

    pub fn episode_numbers(&self) -> Option<(i32, i32)> {
        self.episode
            .as_ref()
            .map(|e| (e.season_number, e.episode_number))
    }

    /// Season posters for season 0 are specials.
    pub fn effective_type(&self) -> ImageType {
        match self.image_type {
            ImageType::SeasonPoster if self.season_number() == Some(0) => {
                ImageType::SpecialSeasonPoster
            }
            other => other,
        }
    }

    /// Short human label, e.g. `Poster`, `Season 03 Poster`, `S01E02 Titlecard`.
    pub fn describe(&self) -> String {
        match self.effective_type() {
            ImageType::Poster => "Poster".to_string(),
            ImageType::Backdrop => "Backdrop".to_string(),
            ImageType::SeasonPoster | ImageType::SpecialSeasonPoster => {
                format!("Season {:02} Poster", self.season_number().unwrap_or(0))
            }
            ImageType::Titlecard => match self.episode_numbers() {
                Some((s, e)) => format!("S{s:02}E{e:02} Titlecard"),
                None => "Titlecard".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SetUser {
    #[serde(default)]
    pub name: String,
}

/// An upstream-authored bundle of artwork for one item or collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PosterSet {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "type")]
    pub kind: SetKind,
    #[serde(default)]
    pub user: SetUser,
    #[serde(default)]
    pub date_created: Timestamp,
    #[serde(default)]
    pub date_updated: Timestamp,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<PosterFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backdrop: Option<PosterFile>,
    #[serde(default)]
    pub season_posters: Vec<PosterFile>,
    #[serde(default)]
    pub titlecards: Vec<PosterFile>,
    /// Collection sets only; carried through but never applied.
    #[serde(default)]
    pub other_posters: Vec<PosterFile>,
    #[serde(default)]
    pub other_backdrops: Vec<PosterFile>,
}

impl PosterSet {
    /// Files of this set whose type is selected, in slot order: poster,
    /// backdrop, season posters, title cards.
    pub fn candidate_files(&self, selected: &SelectedTypes) -> Vec<PosterFile> {
        self.poster
            .iter()
            .chain(self.backdrop.iter())
            .chain(self.season_posters.iter())
            .chain(self.titlecards.iter())
            .filter(|f| selected.contains(f.effective_type()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn season_poster(number: i32) -> PosterFile {
        PosterFile {
            id: format!("s{number}"),
            image_type: ImageType::SeasonPoster,
            season: Some(SeasonRef { number }),
            ..Default::default()
        }
    }

    #[test]
    fn csv_is_canonical_regardless_of_insertion_order() {
        let a = SelectedTypes::new([ImageType::Titlecard, ImageType::Poster]);
        let b = SelectedTypes::new([ImageType::Poster, ImageType::Titlecard]);
        assert_eq!(a, b);
        assert_eq!(a.to_csv(), "poster,titlecard");
    }

    #[test]
    fn from_csv_drops_unknown_and_blank_entries() {
        let types = SelectedTypes::from_csv("poster,,bogus, seasonPoster");
        assert_eq!(types, SelectedTypes::new([ImageType::Poster, ImageType::SeasonPoster]));
        assert!(SelectedTypes::from_csv("").is_empty());
    }

    #[test]
    fn difference_removes_shared_types() {
        let stored = SelectedTypes::new([ImageType::Poster, ImageType::Backdrop]);
        let incoming = SelectedTypes::new([ImageType::Poster]);
        assert_eq!(
            stored.difference(&incoming),
            SelectedTypes::new([ImageType::Backdrop])
        );
    }

    #[test]
    fn season_zero_is_special() {
        assert_eq!(season_poster(0).effective_type(), ImageType::SpecialSeasonPoster);
        assert_eq!(season_poster(1).effective_type(), ImageType::SeasonPoster);
    }

    #[test]
    fn candidate_files_respects_selection() {
        let set = PosterSet {
            id: "set".into(),
            poster: Some(PosterFile {
                id: "p".into(),
                image_type: ImageType::Poster,
                ..Default::default()
            }),
            season_posters: vec![season_poster(0), season_poster(1)],
            ..Default::default()
        };

        let only_specials = SelectedTypes::new([ImageType::SpecialSeasonPoster]);
        let ids: Vec<_> = set
            .candidate_files(&only_specials)
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec!["s0"]);

        let poster_and_seasons = SelectedTypes::new([ImageType::Poster, ImageType::SeasonPoster]);
        let ids: Vec<_> = set
            .candidate_files(&poster_and_seasons)
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec!["p", "s1"]);
    }

    #[test]
    fn describe_formats_slots() {
        assert_eq!(season_poster(3).describe(), "Season 03 Poster");
        let card = PosterFile {
            image_type: ImageType::Titlecard,
            episode: Some(EpisodeRef {
                title: String::new(),
                season_number: 1,
                episode_number: 2,
            }),
            ..Default::default()
        };
        assert_eq!(card.describe(), "S01E02 Titlecard");
    }
}
