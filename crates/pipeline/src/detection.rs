//! Pure change-detection rules.
//!
//! Nothing here does I/O: given a stored item, the latest item and a file,
//! these functions decide whether the file must be applied and why.

use aura_core::media::MediaItem;
use aura_core::poster::{ImageType, PosterFile, PosterSet};
use aura_core::time::{format_rfc3339, is_older};
use serde::Serialize;

pub const REASON_DOWNLOADING: &str = "Downloading";
pub const REASON_REDOWNLOADING: &str = "Redownloading";

/// Skip reason when none of the change signals fired.
pub const NO_UPDATES: &str = "No updates to poster set, seasons/episodes or rating key";

/// A file that must be applied, with the reason shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledDownload {
    pub file: PosterFile,
    pub reason_title: String,
    pub reason_detail: String,
}

impl ScheduledDownload {
    pub fn new(file: &PosterFile, detail: impl Into<String>) -> Self {
        Self {
            file: file.clone(),
            reason_title: REASON_DOWNLOADING.to_string(),
            reason_detail: detail.into(),
        }
    }

    pub fn redownload(file: &PosterFile, detail: impl Into<String>) -> Self {
        Self {
            file: file.clone(),
            reason_title: REASON_REDOWNLOADING.to_string(),
            reason_detail: detail.into(),
        }
    }

    /// Rewrite the reason after the item's rating key changed.
    pub fn after_rating_key_change(self) -> Self {
        Self {
            reason_title: REASON_REDOWNLOADING.to_string(),
            reason_detail: format!("Rating key changed and {}", self.reason_detail),
            file: self.file,
        }
    }
}

/// Decide whether `file` must be applied for a subscription last downloaded
/// at `last_downloaded`.
pub fn should_download_file(
    stored: &MediaItem,
    latest: &MediaItem,
    file: &PosterFile,
    last_downloaded: &str,
) -> Option<ScheduledDownload> {
    if is_older(last_downloaded, &file.modified) {
        return Some(ScheduledDownload::new(
            file,
            format!(
                "File updated on {} (last download was {})",
                format_rfc3339(&file.modified),
                last_downloaded
            ),
        ));
    }

    match file.effective_type() {
        ImageType::SeasonPoster | ImageType::SpecialSeasonPoster => {
            let number = file.season_number()?;
            (stored.season(number).is_none() && latest.season(number).is_some())
                .then(|| ScheduledDownload::new(file, format!("Season {number:02} was added")))
        }
        ImageType::Titlecard => {
            let (season, episode) = file.episode_numbers()?;
            let label = format!("S{season:02}E{episode:02}");
            let new_episode = latest.episode(season, episode)?;
            match stored.episode(season, episode) {
                None => Some(ScheduledDownload::new(file, format!("{label} was added"))),
                Some(old) if old.file.path != new_episode.file.path => {
                    Some(ScheduledDownload::new(
                        file,
                        format!(
                            "{label} path changed from {} to {}",
                            old.file.path, new_episode.file.path
                        ),
                    ))
                }
                Some(_) => None,
            }
        }
        ImageType::Poster | ImageType::Backdrop => None,
    }
}

/// The four signals that make a show subscription worth re-checking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShowChanges {
    pub set_newer: bool,
    pub structure_grew: bool,
    pub paths_changed: bool,
    pub rating_key_changed: bool,
}

impl ShowChanges {
    /// `force` treats the set as newer, as for a push from upstream.
    pub fn detect(
        stored: &MediaItem,
        latest: &MediaItem,
        set: &PosterSet,
        last_downloaded: &str,
        force: bool,
    ) -> Self {
        Self {
            set_newer: force || is_older(last_downloaded, &set.date_updated),
            structure_grew: latest.season_count() > stored.season_count()
                || latest.episode_count() > stored.episode_count(),
            paths_changed: episode_paths_changed(stored, latest),
            rating_key_changed: stored.rating_key != latest.rating_key,
        }
    }

    pub fn any(&self) -> bool {
        self.set_newer || self.structure_grew || self.paths_changed || self.rating_key_changed
    }
}

/// Any episode present in both items with a different file path.
pub fn episode_paths_changed(stored: &MediaItem, latest: &MediaItem) -> bool {
    let Some(series) = stored.series.as_ref() else {
        return false;
    };
    series
        .seasons
        .iter()
        .flat_map(|s| s.episodes.iter())
        .any(|old| {
            latest
                .episode(old.season_number, old.episode_number)
                .is_some_and(|new| new.file.path != old.file.path)
        })
}

/// What changed on a movie, or `None` when nothing did.
pub fn movie_changes(stored: &MediaItem, latest: &MediaItem) -> Option<String> {
    let mut changes = Vec::new();
    if stored.rating_key != latest.rating_key {
        changes.push(format!(
            "Rating key changed from {} to {}",
            stored.rating_key, latest.rating_key
        ));
    }
    let old_path = stored.movie_path().unwrap_or_default();
    let new_path = latest.movie_path().unwrap_or_default();
    if old_path != new_path {
        changes.push(format!("Path changed from {old_path} to {new_path}"));
    }
    (!changes.is_empty()).then(|| changes.join(" and "))
}
