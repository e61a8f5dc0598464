//! Fakes and fixtures shared by the worker tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use aura_core::config::{AppPaths, LibraryConfig, MediaServerType};
use aura_core::library_cache::{LibraryCache, LibrarySection};
use aura_core::media::{Episode, MediaFile, MediaItem, MediaType, Season, Series};
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

#[derive(Default)]
pub struct FakeServer {
    pub items: Mutex<HashMap<String, MediaItem>>,
    /// Items served by `fetch_section_items`, keyed by section title.
    pub sections: Mutex<HashMap<String, Vec<MediaItem>>>,
    pub applied: Mutex<Vec<(String, ImageType)>>,
    /// Listing entries that expand into several items, keyed by rating key.
    pub collections: Mutex<HashMap<String, Vec<MediaItem>>>,
    /// Listing entries that yield no item at all.
    pub unsupported: Mutex<HashSet<String>>,
}

impl FakeServer {
    pub fn add_item(&self, item: MediaItem) {
        self.items
            .lock()
            .unwrap()
            .insert(item.rating_key.clone(), item);
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

    async fn fetch_section_info(&self, library: &mut LibraryConfig) -> Result<bool, MediaServerError> {
        if !self.sections.lock().unwrap().contains_key(&library.name) {
            return Ok(false);
        }
        library.section_id = "1".into();
        library.section_type = "movie".into();
        library.path = format!("/data/{}", library.name.to_lowercase());
        Ok(true)
    }

    async fn list_sections(&self) -> Result<Vec<String>, MediaServerError> {
        Ok(self.sections.lock().unwrap().keys().cloned().collect())
    }

    async fn fetch_section_items(
        &self,
        section: &LibrarySection,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<MediaItem>, usize), MediaServerError> {
        let sections = self.sections.lock().unwrap();
        let all = sections
            .get(&section.title)
            .ok_or_else(|| MediaServerError::NotFound(section.title.clone()))?;
        let collections = self.collections.lock().unwrap();
        let unsupported = self.unsupported.lock().unwrap();
        let mut page = Vec::new();
        for entry in all.iter().skip(offset).take(limit) {
            if let Some(members) = collections.get(&entry.rating_key) {
                page.extend(members.iter().cloned());
            } else if !unsupported.contains(&entry.rating_key) {
                page.push(entry.clone());
            }
        }
        Ok((page, all.len()))
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
    pub sets: Mutex<HashMap<String, PosterSet>>,
}

impl FakeSource {
    pub fn add_set(&self, set: PosterSet) {
        self.sets.lock().unwrap().insert(set.id.clone(), set);
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
        Ok(self.sets.lock().unwrap().get(set_id).cloned())
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
                    path: format!("/tv/Dark/Season {n:02}/S{n:02}E01.mkv"),
                    size: 1,
                    duration: 1,
                },
            }],
        })
        .collect();
    MediaItem {
        tmdb_id: "70523".into(),
        library_title: "TV".into(),
        rating_key: rating_key.into(),
        media_type: MediaType::Show,
        title: "Dark".into(),
        year: 2017,
        series: Some(Series::from_seasons(seasons, "/tv/Dark")),
        ..Default::default()
    }
}

pub fn show_set(id: &str, modified: &str, seasons: &[i32]) -> PosterSet {
    PosterSet {
        id: id.into(),
        kind: SetKind::Show,
        user: SetUser { name: "artist".into() },
        date_updated: parse_rfc3339(modified).unwrap(),
        season_posters: seasons
            .iter()
            .map(|&number| PosterFile {
                id: format!("{id}-s{number}"),
                image_type: ImageType::SeasonPoster,
                modified: parse_rfc3339(modified).unwrap(),
                season: Some(SeasonRef { number }),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

pub fn record(item: MediaItem, set: PosterSet) -> MediaItemWithSubs {
    MediaItemWithSubs::new(
        item,
        vec![Subscription {
            poster_set: set,
            selected_types: SelectedTypes::new([ImageType::SeasonPoster]),
            auto_download: true,
            last_downloaded: "2024-01-01T00:00:00Z".into(),
        }],
    )
}

pub struct Harness {
    pub db: DbPool,
    pub cache: Arc<LibraryCache>,
    pub server: Arc<FakeServer>,
    pub source: Arc<FakeSource>,
    pub detector: ChangeDetector,
    pub paths: AppPaths,
    pub dir: TempDir,
}

pub async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let paths = AppPaths::new(dir.path());
    for d in paths.all_dirs() {
        std::fs::create_dir_all(d).unwrap();
    }
    let cache = Arc::new(LibraryCache::new());
    let db = aura_db::create_memory_pool().await.unwrap();
    aura_db::run_migrations(&db, &MigrationContext { paths: &paths, cache: &cache })
        .await
        .unwrap();

    let server = Arc::new(FakeServer::default());
    let source = Arc::new(FakeSource::default());
    let executor = Executor::new(
        server.clone(),
        source.clone(),
        Arc::clone(&cache),
        TaskPool::start(1, 16),
        paths.clone(),
    );
    Harness {
        detector: ChangeDetector::new(db.clone(), executor),
        db,
        cache,
        server,
        source,
        paths,
        dir,
    }
}
