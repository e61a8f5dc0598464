/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Identity of a media item in one library section: `(TMDB_ID, LibraryTitle)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ItemKey {
    pub tmdb_id: String,
    pub library_title: String,
}

impl ItemKey {
    pub fn new(tmdb_id: impl Into<String>, library_title: impl Into<String>) -> Self {
        Self {
            tmdb_id: tmdb_id.into(),
            library_title: library_title.into(),
        }
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.tmdb_id, self.library_title)
    }
}
