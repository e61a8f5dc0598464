//! In-memory media server and poster-set source for pipeline tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use aura_core::config::{AppPaths, LibraryConfig, MediaServerType};
use aura_core::library_cache::{LibraryCache, LibrarySection};
use aura_core::media::{Episode, MediaFile, MediaItem, MediaType, Movie, Season, Series};
use aura_core::poster::{
    ImageType, PosterFile, PosterSet, SeasonRef, SelectedTypes, SetKind, SetUser,
};
use aura_core::subscription::{MediaItemWithSubs, Subscription};
use aura_core::time::parse_rfc3339;
use aura_db::migrations::MigrationContext;
use aura_db::DbPool;
use aura_events::TaskPool;
use aura_mediaserver::{ApplyImage, ArtworkKind, MediaServer, MediaServerError};
use aura_mediux::{ImageData, MediuxError, PosterSetSource};
use aura_pipeline::{ChangeDetector, Executor};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeServer {
    pub items: Mutex<HashMap<String, MediaItem>>,
    /// `(rating_key, image_type)` per apply, in order.
    pub applied: Mutex<Vec<(String, ImageType)>>,
}

impl FakeServer {
    pub fn with_item(item: MediaItem) -> Arc<Self> {
        let server = Self::default();
        server
            .items
            .lock()
            .unwrap()
            .insert(item.rating_key.clone(), item);
        Arc::new(server)
    }

    pub fn applied(&self) -> Vec<(String, ImageType)> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaServer for FakeServer {
    fn server_type(&self) -> MediaServerType {
        MediaServerType::Plex
    }

    async fn get_status(&self) -> Result<String, MediaServerError> {
        Ok("1.0".into())
    }

    async fn init_connection(&self) -> Result<(), MediaServerError> {
        Ok(())
    }

    async fn fetch_section_info(&self, _library: &mut LibraryConfig) -> Result<bool, MediaServerError> {
        Ok(true)
    }

    async fn list_sections(&self) -> Result<Vec<String>, MediaServerError> {
        Ok(vec![])
    }

    async fn fetch_section_items(
        &self,
        _section: &LibrarySection,
        _offset: usize,
        _limit: usize,
    ) -> Result<(Vec<MediaItem>, usize), MediaServerError> {
        Ok((vec![], 0))
    }

    async fn fetch_item_content(
        &self,
        rating_key: &str,
        _section_title: &str,
    ) -> Result<MediaItem, MediaServerError> {
        self.items
            .lock()
            .unwrap()
            .get(rating_key)
            .cloned()
            .ok_or_else(|| MediaServerError::NotFound(rating_key.to_string()))
    }

    async fn fetch_image(&self, _rating_key: &str, _kind: ArtworkKind) -> Result<Vec<u8>, MediaServerError> {
        Ok(vec![])
    }

    async fn apply_image(&self, image: &ApplyImage<'_>) -> Result<(), MediaServerError> {
        self.applied
            .lock()
            .unwrap()
            .push((image.rating_key.to_string(), image.image_type));
        Ok(())
    }

    async fn refresh_item(&self, _rating_key: &str) -> Result<(), MediaServerError> {
        Ok(())
    }

    async fn rate_item(&self, _rating_key: &str, _score: f32) -> Result<(), MediaServerError> {
        Ok(())
    }

    async fn apply_labels(&self, _rk: &str, _add: &[String], _remove: &[String]) -> Result<(), MediaServerError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeSource {
    /// `None` means the set was deleted upstream.
    pub sets: Mutex<HashMap<String, Option<PosterSet>>>,
}

impl FakeSource {
    pub fn with_sets(sets: Vec<(&str, Option<PosterSet>)>) -> Arc<Self> {
        let source = Self::default();
        {
            let mut map = source.sets.lock().unwrap();
            for (id, set) in sets {
                map.insert(id.to_string(), set);
            }
        }
        Arc::new(source)
    }
}

#[async_trait]
impl PosterSetSource for FakeSource {
    async fn fetch_set_by_id(
        &self,
        _kind: SetKind,
        _tmdb_id: &str,
        set_id: &str,
    ) -> Result<Option<PosterSet>, MediuxError> {
        Ok(self.sets.lock().unwrap().get(set_id).cloned().flatten())
    }

    async fn fetch_image(&self, _file: &PosterFile) -> Result<ImageData, MediuxError> {
        Ok(ImageData {
            bytes: vec![0xff, 0xd8, 0xff],
            content_type: "image/jpeg".into(),
        })
    }

    async fn release_image(&self, _file: &PosterFile) -> Result<(), MediuxError> {
        Ok(())
    }

    fn image_url(&self, file: &PosterFile) -> String {
        format!("https://images.example/assets/{}", file.id)
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub const LAST_DOWNLOADED: &str = "2024-01-01T00:00:00Z";

pub fn show(rating_key: &str, seasons: &[i32]) -> MediaItem {
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
                title: "Episode 1".into(),
                file: MediaFile {
                    path: format!("/tv/Game of Thrones/Season {n:02}/S{n:02}E01.mkv"),
                    size: 1,
                    duration: 1,
                },
            }],
        })
        .collect();
    MediaItem {
        tmdb_id: "1399".into(),
        library_title: "TV".into(),
        rating_key: rating_key.into(),
        media_type: MediaType::Show,
        title: "Game of Thrones".into(),
        year: 2011,
        series: Some(Series::from_seasons(seasons, "/tv/Game of Thrones")),
        ..Default::default()
    }
}

pub fn movie(rating_key: &str, path: &str) -> MediaItem {
    MediaItem {
        tmdb_id: "949".into(),
        library_title: "Movies".into(),
        rating_key: rating_key.into(),
        media_type: MediaType::Movie,
        title: "Heat".into(),
        year: 1995,
        movie: Some(Movie {
            file: MediaFile {
                path: path.into(),
                size: 1,
                duration: 1,
            },
        }),
        ..Default::default()
    }
}

pub fn season_poster(number: i32, modified: &str) -> PosterFile {
    PosterFile {
        id: format!("asset-s{number}"),
        image_type: ImageType::SeasonPoster,
        modified: parse_rfc3339(modified).unwrap(),
        season: Some(SeasonRef { number }),
        ..Default::default()
    }
}

pub fn show_set(id: &str, date_updated: &str, seasons: &[i32]) -> PosterSet {
    PosterSet {
        id: id.into(),
        title: "Game of Thrones Set".into(),
        kind: SetKind::Show,
        user: SetUser { name: "artist".into() },
        date_updated: parse_rfc3339(date_updated).unwrap(),
        season_posters: seasons
            .iter()
            .map(|&n| season_poster(n, "2023-12-01T00:00:00Z"))
            .collect(),
        ..Default::default()
    }
}

pub fn subscription(set: PosterSet, types: &[ImageType], auto_download: bool) -> Subscription {
    Subscription {
        poster_set: set,
        selected_types: SelectedTypes::new(types.iter().copied()),
        auto_download,
        last_downloaded: LAST_DOWNLOADED.into(),
    }
}

pub fn record(item: MediaItem, subscriptions: Vec<Subscription>) -> MediaItemWithSubs {
    MediaItemWithSubs::new(item, subscriptions)
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub db: DbPool,
    pub cache: Arc<LibraryCache>,
    pub detector: ChangeDetector,
    pub paths: AppPaths,
    _dir: TempDir,
}

pub async fn harness(server: Arc<FakeServer>, source: Arc<FakeSource>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let paths = AppPaths::new(dir.path());
    let cache = Arc::new(LibraryCache::new());
    let db = aura_db::create_memory_pool().await.unwrap();
    aura_db::run_migrations(&db, &MigrationContext { paths: &paths, cache: &cache })
        .await
        .unwrap();

    let executor = Executor::new(server, source, Arc::clone(&cache), TaskPool::start(1, 16), paths.clone());
    Harness {
        detector: ChangeDetector::new(db.clone(), executor),
        db,
        cache,
        paths,
        _dir: dir,
    }
}
