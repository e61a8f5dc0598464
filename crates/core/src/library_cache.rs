//! In-memory index of media items per library section.
//!
//! Within a section TMDB ids are unique and `total_size` always equals the
//! number of items. All access goes through one `RwLock`, so readers never
//! observe a half-applied mutation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::media::MediaItem;
use crate::title::normalize_title;

/// One library section on the media server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySection {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub section_type: String,
    pub path: String,
    pub media_items: Vec<MediaItem>,
    pub total_size: usize,
}

impl LibrarySection {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Insert or replace by TMDB id. Items without one are dropped.
    fn merge_item(&mut self, item: MediaItem) {
        if item.tmdb_id.is_empty() {
            return;
        }
        match self
            .media_items
            .iter_mut()
            .find(|existing| existing.tmdb_id == item.tmdb_id)
        {
            Some(existing) => *existing = item,
            None => self.media_items.push(item),
        }
        self.total_size = self.media_items.len();
    }
}

/// Process-local cache of `LibraryTitle -> LibrarySection`.
#[derive(Debug, Default)]
pub struct LibraryCache {
    sections: RwLock<HashMap<String, LibrarySection>>,
}

impl LibraryCache {
    pub fn new() -> Self {
        Self::default()
    }

    // -- mutators ----------------------------------------------------------

    /// Merge `section` into the cache: refresh metadata, update items in
    /// place by TMDB id and append new ones.
    pub async fn upsert_section(&self, section: LibrarySection) {
        let mut sections = self.sections.write().await;
        let entry = sections
            .entry(section.title.clone())
            .or_insert_with(|| LibrarySection::new(section.title.clone()));

        if !section.id.is_empty() {
            entry.id = section.id;
        }
        if !section.section_type.is_empty() {
            entry.section_type = section.section_type;
        }
        if !section.path.is_empty() {
            entry.path = section.path;
        }
        for item in section.media_items {
            entry.merge_item(item);
        }
        entry.total_size = entry.media_items.len();
    }

    /// Upsert one item into `section_title`, creating the section if needed.
    pub async fn upsert_media_item(&self, section_title: &str, item: MediaItem) {
        let mut sections = self.sections.write().await;
        sections
            .entry(section_title.to_string())
            .or_insert_with(|| LibrarySection::new(section_title))
            .merge_item(item);
    }

    pub async fn remove_section(&self, title: &str) -> Option<LibrarySection> {
        self.sections.write().await.remove(title)
    }

    pub async fn clear(&self) {
        self.sections.write().await.clear();
    }

    // -- readers -----------------------------------------------------------

    pub async fn get_by_title(&self, title: &str) -> Option<LibrarySection> {
        self.sections.read().await.get(title).cloned()
    }

    pub async fn get_item_by_tmdb(&self, section_title: &str, tmdb_id: &str) -> Option<MediaItem> {
        self.sections
            .read()
            .await
            .get(section_title)?
            .media_items
            .iter()
            .find(|item| item.tmdb_id == tmdb_id)
            .cloned()
    }

    /// Find by normalised title and exact year.
    pub async fn get_item_by_title_and_year(
        &self,
        section_title: &str,
        title: &str,
        year: i32,
    ) -> Option<MediaItem> {
        let wanted = normalize_title(title);
        self.sections
            .read()
            .await
            .get(section_title)?
            .media_items
            .iter()
            .find(|item| item.year == year && normalize_title(&item.title) == wanted)
            .cloned()
    }

    /// Sections ordered by title.
    pub async fn list_sorted_by_title(&self) -> Vec<LibrarySection> {
        let mut sections: Vec<_> = self.sections.read().await.values().cloned().collect();
        sections.sort_by(|a, b| a.title.cmp(&b.title));
        sections
    }

    pub async fn is_empty(&self) -> bool {
        self.sections.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaType, Movie};

    fn movie(tmdb: &str, title: &str, year: i32, rating_key: &str) -> MediaItem {
        MediaItem {
            tmdb_id: tmdb.into(),
            library_title: "Movies".into(),
            rating_key: rating_key.into(),
            media_type: MediaType::Movie,
            title: title.into(),
            year,
            movie: Some(Movie::default()),
            ..Default::default()
        }
    }

    fn section(items: Vec<MediaItem>) -> LibrarySection {
        LibrarySection {
            id: "1".into(),
            title: "Movies".into(),
            section_type: "movie".into(),
            path: "/data/movies".into(),
            media_items: items,
            total_size: 0,
        }
    }

    #[tokio::test]
    async fn upsert_section_merges_by_tmdb() {
        let cache = LibraryCache::new();
        cache
            .upsert_section(section(vec![movie("1", "Alien", 1979, "10"), movie("2", "Aliens", 1986, "11")]))
            .await;
        cache
            .upsert_section(section(vec![movie("2", "Aliens", 1986, "99"), movie("3", "Alien 3", 1992, "12")]))
            .await;

        let s = cache.get_by_title("Movies").await.expect("section");
        assert_eq!(s.total_size, 3);
        assert_eq!(s.media_items.len(), 3);
        let keys: Vec<_> = s.media_items.iter().map(|i| i.rating_key.as_str()).collect();
        assert_eq!(keys, vec!["10", "99", "12"]);
    }

    #[tokio::test]
    async fn duplicate_tmdb_in_one_batch_collapses() {
        let cache = LibraryCache::new();
        cache
            .upsert_section(section(vec![movie("1", "Alien", 1979, "10"), movie("1", "Alien", 1979, "20")]))
            .await;
        let s = cache.get_by_title("Movies").await.expect("section");
        assert_eq!(s.total_size, 1);
        assert_eq!(s.media_items[0].rating_key, "20");
    }

    #[tokio::test]
    async fn items_without_tmdb_are_skipped() {
        let cache = LibraryCache::new();
        cache.upsert_media_item("Movies", movie("", "Home Video", 2001, "5")).await;
        let s = cache.get_by_title("Movies").await.expect("section");
        assert_eq!(s.total_size, 0);
    }

    #[tokio::test]
    async fn title_and_year_lookup_is_normalised() {
        let cache = LibraryCache::new();
        cache
            .upsert_media_item(
                "Movies",
                movie("121", "The Lord of the Rings: The Two Towers", 2002, "7"),
            )
            .await;

        let found = cache
            .get_item_by_title_and_year("Movies", "The Lord of the Rings The Two Towers (2002)", 2002)
            .await;
        assert_eq!(found.map(|i| i.tmdb_id), Some("121".to_string()));

        assert!(cache
            .get_item_by_title_and_year("Movies", "The Lord of the Rings The Two Towers", 2003)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn remove_clear_and_listing() {
        let cache = LibraryCache::new();
        assert!(cache.is_empty().await);
        cache.upsert_media_item("TV", movie("1", "a", 1, "1")).await;
        cache.upsert_media_item("Anime", movie("2", "b", 2, "2")).await;

        let titles: Vec<_> = cache
            .list_sorted_by_title()
            .await
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["Anime", "TV"]);

        assert!(cache.remove_section("TV").await.is_some());
        assert!(cache.get_item_by_tmdb("TV", "1").await.is_none());
        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
