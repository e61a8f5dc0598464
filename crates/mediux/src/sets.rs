//! Poster-set queries and the mapping from MediUX records to [`PosterSet`].
//!
//! MediUX stores every image of a set in one `files` list; the slot of a file
//! follows from its `file_type` and which of `season_id` / `episode_id` /
//! `movie_id` it references.

use aura_core::media::MediaType;
use aura_core::poster::{
    EpisodeRef, ImageType, PosterFile, PosterSet, SeasonRef, SetKind, SetUser,
};
use aura_core::types::Timestamp;
use serde::Deserialize;
use serde_json::json;

use crate::api::MediuxApi;
use crate::error::MediuxError;

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

macro_rules! set_fields {
    () => {
        "id set_title status date_created date_updated user_created { username } \
         files { id file_type modified_on filesize \
           show_id { id } movie_id { id } collection_id { id } \
           season_id { season_number } \
           episode_id { episode_title episode_number season_id { season_number } } }"
    };
}

const SHOW_SETS_QUERY: &str = concat!(
    "query ShowSets($tmdb_id: ID!) { shows_by_id(id: $tmdb_id) { id show_sets { ",
    set_fields!(),
    " } } }"
);

const MOVIE_SETS_QUERY: &str = concat!(
    "query MovieSets($tmdb_id: ID!) { movies_by_id(id: $tmdb_id) { id movie_sets { ",
    set_fields!(),
    " } collection_id { id collection_sets { ",
    set_fields!(),
    " } } } }"
);

const SHOW_SET_BY_ID_QUERY: &str = concat!(
    "query ShowSet($id: ID!) { set: show_sets_by_id(id: $id) { ",
    set_fields!(),
    " } }"
);

const MOVIE_SET_BY_ID_QUERY: &str = concat!(
    "query MovieSet($id: ID!) { set: movie_sets_by_id(id: $id) { ",
    set_fields!(),
    " } }"
);

const COLLECTION_SET_BY_ID_QUERY: &str = concat!(
    "query CollectionSet($id: ID!) { set: collection_sets_by_id(id: $id) { ",
    set_fields!(),
    " } }"
);

const USER_SETS_QUERY: &str = concat!(
    "query UserSets($username: String!) { \
     show_sets(filter: { user_created: { username: { _eq: $username } } }, limit: -1) { ",
    set_fields!(),
    " } movie_sets(filter: { user_created: { username: { _eq: $username } } }, limit: -1) { ",
    set_fields!(),
    " } collection_sets(filter: { user_created: { username: { _eq: $username } } }, limit: -1) { ",
    set_fields!(),
    " } }"
);

const FOLLOWS_AND_HIDES_QUERY: &str = "query FollowsAndHides { \
     user_follows(limit: -1) { followee_id { username } } \
     user_hides(limit: -1) { hiding_id { username } } }";

const COLLECTION_SETS_BY_MOVIES_QUERY: &str = concat!(
    "query CollectionSetsByMovies($ids: [String]) { \
     collection_sets(filter: { files: { movie_id: { id: { _in: $ids } } } }, limit: -1) { ",
    set_fields!(),
    " } }"
);

const COLLECTION_SETS_BY_TMDB_QUERY: &str = concat!(
    "query CollectionSets($tmdb_id: ID!) { collections_by_id(id: $tmdb_id) { id collection_sets { ",
    set_fields!(),
    " } } }"
);

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WireRef {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct WireUser {
    #[serde(default)]
    username: String,
}

#[derive(Debug, Deserialize)]
struct WireSeason {
    season_number: i32,
}

#[derive(Debug, Deserialize)]
struct WireEpisode {
    #[serde(default)]
    episode_title: Option<String>,
    episode_number: i32,
    season_id: Option<WireSeason>,
}

/// Directus serialises big integers as strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireNumber {
    Int(i64),
    Text(String),
}

impl WireNumber {
    fn value(&self) -> i64 {
        match self {
            WireNumber::Int(n) => *n,
            WireNumber::Text(s) => s.trim().parse().unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireFile {
    id: String,
    #[serde(default)]
    file_type: String,
    modified_on: Option<Timestamp>,
    filesize: Option<WireNumber>,
    movie_id: Option<WireRef>,
    season_id: Option<WireSeason>,
    episode_id: Option<WireEpisode>,
}

#[derive(Debug, Deserialize)]
struct WireSet {
    id: String,
    #[serde(default)]
    set_title: Option<String>,
    #[serde(default)]
    status: Option<String>,
    date_created: Option<Timestamp>,
    date_updated: Option<Timestamp>,
    user_created: Option<WireUser>,
    #[serde(default)]
    files: Vec<WireFile>,
}

#[derive(Debug, Deserialize)]
struct WireCollection {
    #[serde(default)]
    collection_sets: Vec<WireSet>,
}

#[derive(Debug, Deserialize)]
struct ShowSetsData {
    shows_by_id: Option<WireShow>,
}

#[derive(Debug, Deserialize)]
struct WireShow {
    #[serde(default)]
    show_sets: Vec<WireSet>,
}

#[derive(Debug, Deserialize)]
struct MovieSetsData {
    movies_by_id: Option<WireMovie>,
}

#[derive(Debug, Deserialize)]
struct WireMovie {
    #[serde(default)]
    movie_sets: Vec<WireSet>,
    collection_id: Option<WireCollection>,
}

#[derive(Debug, Deserialize)]
struct SetByIdData {
    set: Option<WireSet>,
}

#[derive(Debug, Deserialize)]
struct UserSetsData {
    #[serde(default)]
    show_sets: Vec<WireSet>,
    #[serde(default)]
    movie_sets: Vec<WireSet>,
    #[serde(default)]
    collection_sets: Vec<WireSet>,
}

#[derive(Debug, Deserialize)]
struct FollowsAndHidesData {
    #[serde(default)]
    user_follows: Vec<WireFollow>,
    #[serde(default)]
    user_hides: Vec<WireHide>,
}

#[derive(Debug, Deserialize)]
struct WireFollow {
    followee_id: Option<WireUser>,
}

#[derive(Debug, Deserialize)]
struct WireHide {
    hiding_id: Option<WireUser>,
}

#[derive(Debug, Deserialize)]
struct CollectionSetsData {
    #[serde(default)]
    collection_sets: Vec<WireSet>,
}

#[derive(Debug, Deserialize)]
struct CollectionsByIdData {
    collections_by_id: Option<WireCollection>,
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

fn to_poster_file(file: &WireFile) -> Option<PosterFile> {
    let mut out = PosterFile {
        id: file.id.clone(),
        modified: file.modified_on.unwrap_or_default(),
        file_size: file.filesize.as_ref().map(WireNumber::value).unwrap_or(0),
        ..Default::default()
    };
    match file.file_type.as_str() {
        "poster" => match &file.season_id {
            Some(season) => {
                out.image_type = ImageType::SeasonPoster;
                out.season = Some(SeasonRef {
                    number: season.season_number,
                });
            }
            None => out.image_type = ImageType::Poster,
        },
        "backdrop" => out.image_type = ImageType::Backdrop,
        "title_card" => {
            let episode = file.episode_id.as_ref()?;
            out.image_type = ImageType::Titlecard;
            out.episode = Some(EpisodeRef {
                title: episode.episode_title.clone().unwrap_or_default(),
                season_number: episode.season_id.as_ref().map(|s| s.season_number)?,
                episode_number: episode.episode_number,
            });
        }
        other => {
            tracing::debug!(file_id = %file.id, file_type = other, "Skipping unknown file type");
            return None;
        }
    }
    Some(out)
}

/// Convert a set. For collection sets, `focus_movie` picks the movie whose
/// poster and backdrop fill the primary slots; every other file lands in
/// `other_posters` / `other_backdrops`.
fn to_poster_set(set: WireSet, kind: SetKind, focus_movie: Option<&str>) -> PosterSet {
    let mut out = PosterSet {
        id: set.id,
        title: set.set_title.unwrap_or_default(),
        kind,
        user: SetUser {
            name: set.user_created.unwrap_or_default().username,
        },
        date_created: set.date_created.unwrap_or_default(),
        date_updated: set.date_updated.unwrap_or_default(),
        status: set.status.unwrap_or_default(),
        ..Default::default()
    };

    for file in &set.files {
        let Some(poster_file) = to_poster_file(file) else {
            continue;
        };
        let primary = match kind {
            SetKind::Collection => {
                let movie = file.movie_id.as_ref().map(|m| m.id.as_str());
                movie == focus_movie
            }
            SetKind::Show | SetKind::Movie => true,
        };
        match poster_file.image_type {
            ImageType::SeasonPoster | ImageType::SpecialSeasonPoster => {
                out.season_posters.push(poster_file)
            }
            ImageType::Titlecard => out.titlecards.push(poster_file),
            ImageType::Poster if primary && out.poster.is_none() => out.poster = Some(poster_file),
            ImageType::Poster => out.other_posters.push(poster_file),
            ImageType::Backdrop if primary && out.backdrop.is_none() => {
                out.backdrop = Some(poster_file)
            }
            ImageType::Backdrop => out.other_backdrops.push(poster_file),
        }
    }
    out
}

fn to_user(user: Option<WireUser>) -> Option<SetUser> {
    user.filter(|u| !u.username.is_empty())
        .map(|u| SetUser { name: u.username })
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Users the account follows and hides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowsAndHides {
    pub follows: Vec<SetUser>,
    pub hides: Vec<SetUser>,
}

impl MediuxApi {
    /// Every set for a movie or show in library `section`. For movies this
    /// includes the sets of the containing collection that carry artwork for
    /// this movie.
    pub async fn fetch_all_sets(
        &self,
        tmdb_id: &str,
        media_type: MediaType,
        section: &str,
    ) -> Result<Vec<PosterSet>, MediuxError> {
        match self.query_all_sets(tmdb_id, media_type).await {
            Ok(sets) => {
                tracing::debug!(tmdb_id, library = section, count = sets.len(), "Fetched MediUX sets");
                Ok(sets)
            }
            Err(e) => {
                tracing::warn!(tmdb_id, library = section, error = %e, "Failed to fetch MediUX sets");
                Err(e)
            }
        }
    }

    async fn query_all_sets(
        &self,
        tmdb_id: &str,
        media_type: MediaType,
    ) -> Result<Vec<PosterSet>, MediuxError> {
        let variables = json!({ "tmdb_id": tmdb_id });
        let sets = match media_type {
            MediaType::Show => {
                let data: ShowSetsData = self.graphql(SHOW_SETS_QUERY, variables).await?;
                data.shows_by_id
                    .map(|show| show.show_sets)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|s| to_poster_set(s, SetKind::Show, None))
                    .collect()
            }
            MediaType::Movie => {
                let data: MovieSetsData = self.graphql(MOVIE_SETS_QUERY, variables).await?;
                let Some(movie) = data.movies_by_id else {
                    return Ok(Vec::new());
                };
                let mut sets: Vec<PosterSet> = movie
                    .movie_sets
                    .into_iter()
                    .map(|s| to_poster_set(s, SetKind::Movie, None))
                    .collect();
                let collection_sets = movie
                    .collection_id
                    .map(|c| c.collection_sets)
                    .unwrap_or_default();
                sets.extend(
                    collection_sets
                        .into_iter()
                        .map(|s| to_poster_set(s, SetKind::Collection, Some(tmdb_id)))
                        .filter(|s| s.poster.is_some() || s.backdrop.is_some()),
                );
                sets
            }
        };
        Ok(sets)
    }

    /// One set by id; `None` when MediUX no longer has it.
    pub async fn fetch_set_by_id(
        &self,
        kind: SetKind,
        tmdb_id: &str,
        set_id: &str,
    ) -> Result<Option<PosterSet>, MediuxError> {
        let query = match kind {
            SetKind::Show => SHOW_SET_BY_ID_QUERY,
            SetKind::Movie => MOVIE_SET_BY_ID_QUERY,
            SetKind::Collection => COLLECTION_SET_BY_ID_QUERY,
        };
        let data: SetByIdData = self.graphql(query, json!({ "id": set_id })).await?;
        let focus = matches!(kind, SetKind::Collection).then_some(tmdb_id);
        Ok(data
            .set
            .filter(|s| !s.id.is_empty())
            .map(|s| to_poster_set(s, kind, focus)))
    }

    /// Every set authored by `username`, across shows, movies and collections.
    pub async fn fetch_all_user_sets(&self, username: &str) -> Result<Vec<PosterSet>, MediuxError> {
        let data: UserSetsData = self
            .graphql(USER_SETS_QUERY, json!({ "username": username }))
            .await?;
        let shows = data
            .show_sets
            .into_iter()
            .map(|s| to_poster_set(s, SetKind::Show, None));
        let movies = data
            .movie_sets
            .into_iter()
            .map(|s| to_poster_set(s, SetKind::Movie, None));
        let collections = data
            .collection_sets
            .into_iter()
            .map(|s| to_poster_set(s, SetKind::Collection, None));
        Ok(shows.chain(movies).chain(collections).collect())
    }

    pub async fn fetch_user_follows_and_hides(&self) -> Result<FollowsAndHides, MediuxError> {
        let data: FollowsAndHidesData = self.graphql(FOLLOWS_AND_HIDES_QUERY, json!({})).await?;
        Ok(FollowsAndHides {
            follows: data
                .user_follows
                .into_iter()
                .filter_map(|f| to_user(f.followee_id))
                .collect(),
            hides: data
                .user_hides
                .into_iter()
                .filter_map(|h| to_user(h.hiding_id))
                .collect(),
        })
    }

    /// Collection sets carrying artwork for any of `movie_ids`.
    pub async fn fetch_collection_images_by_movie_ids(
        &self,
        movie_ids: &[String],
    ) -> Result<Vec<PosterSet>, MediuxError> {
        if movie_ids.is_empty() {
            return Ok(Vec::new());
        }
        let data: CollectionSetsData = self
            .graphql(COLLECTION_SETS_BY_MOVIES_QUERY, json!({ "ids": movie_ids }))
            .await?;
        Ok(data
            .collection_sets
            .into_iter()
            .map(|s| to_poster_set(s, SetKind::Collection, None))
            .collect())
    }

    /// Sets of the collection with TMDB id `tmdb_id`.
    pub async fn fetch_collection_images_by_tmdb_id(
        &self,
        tmdb_id: &str,
    ) -> Result<Vec<PosterSet>, MediuxError> {
        let data: CollectionsByIdData = self
            .graphql(COLLECTION_SETS_BY_TMDB_QUERY, json!({ "tmdb_id": tmdb_id }))
            .await?;
        Ok(data
            .collections_by_id
            .map(|c| c.collection_sets)
            .unwrap_or_default()
            .into_iter()
            .map(|s| to_poster_set(s, SetKind::Collection, None))
            .collect())
    }
}
