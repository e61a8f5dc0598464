//! Where applied images land on disk.

use std::path::{Path, PathBuf};

use aura_core::config::{AppPaths, ImagesConfig, MediaServerType};
use aura_core::media::MediaItem;
use aura_core::poster::{ImageType, PosterFile};

/// Season directory name for a naming convention: 1 is `Season 1`,
/// anything else `Season 01`. Specials follow the same rule as season 0.
pub fn season_folder(number: i32, convention: u8) -> String {
    match convention {
        1 => format!("Season {number}"),
        _ => format!("Season {number:02}"),
    }
}

/// Directory that holds the item's media on the server.
fn item_base(item: &MediaItem) -> Option<PathBuf> {
    if let Some(path) = item.movie_path().filter(|p| !p.is_empty()) {
        return Path::new(path).parent().map(Path::to_path_buf);
    }
    item.series
        .as_ref()
        .map(|s| s.location.as_str())
        .filter(|l| !l.is_empty())
        .map(PathBuf::from)
}

/// Destination of `file` next to the item's media, or under `images_root`
/// when one is configured.
///
/// `library_root` is the section path from the library cache; when the item
/// lives under it, the relative layout is kept below `images_root`.
/// Otherwise the item's folder name is used as the first component.
pub fn local_destination(
    item: &MediaItem,
    file: &PosterFile,
    convention: u8,
    images_root: Option<&Path>,
    library_root: Option<&str>,
) -> Option<PathBuf> {
    let base = item_base(item)?;
    let (dir, name) = match file.effective_type() {
        ImageType::Poster => (base.clone(), "poster.jpg".to_string()),
        ImageType::Backdrop => (base.clone(), "backdrop.jpg".to_string()),
        ImageType::SeasonPoster | ImageType::SpecialSeasonPoster => {
            let folder = season_folder(file.season_number()?, convention);
            (base.join(&folder), format!("{folder}.jpg"))
        }
        ImageType::Titlecard => {
            let (season, episode) = file.episode_numbers()?;
            let episode_path = Path::new(&item.episode(season, episode)?.file.path);
            let stem = episode_path.file_stem()?.to_string_lossy();
            (episode_path.parent()?.to_path_buf(), format!("{stem}.jpg"))
        }
    };

    let Some(root) = images_root else {
        return Some(dir.join(name));
    };
    let relocated = library_root
        .filter(|r| !r.is_empty())
        .and_then(|r| dir.strip_prefix(r).ok())
        .map(|rel| root.join(rel))
        .or_else(|| {
            let folder = base.file_name()?;
            let rel = dir.strip_prefix(&base).ok()?;
            Some(root.join(folder).join(rel))
        })?;
    Some(relocated.join(name))
}

/// Whether a locally written file is visible to the media server: it must be
/// saved next to the media, not under a separate images root.
pub fn server_visible(images: &ImagesConfig) -> bool {
    images.save_images_locally.enabled && images.save_images_locally.path.trim().is_empty()
}

/// Configured images root, if any.
pub fn images_root(images: &ImagesConfig) -> Option<&Path> {
    let path = images.save_images_locally.path.trim();
    (!path.is_empty()).then(|| Path::new(path))
}

/// Temp thumbnail the UI shows for a slot; removed after an apply so it is
/// fetched again.
pub fn thumb_path(
    paths: &AppPaths,
    server: MediaServerType,
    rating_key: &str,
    image_type: ImageType,
) -> PathBuf {
    let dir = match server {
        MediaServerType::Plex => paths.plex_images(),
        MediaServerType::Emby | MediaServerType::Jellyfin => paths.emby_jellyfin_images(),
    };
    let slot = if image_type.is_backdrop() { "backdrop" } else { "poster" };
    dir.join(format!("{rating_key}_{slot}.jpg"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aura_core::media::{Episode, MediaFile, Movie, Season, Series};
    use aura_core::poster::{EpisodeRef, SeasonRef};

    fn movie() -> MediaItem {
        MediaItem {
            rating_key: "42".into(),
            movie: Some(Movie {
                file: MediaFile {
                    path: "/data/movies/Heat (1995)/Heat.mkv".into(),
                    ..Default::default()
                },
            }),
            ..Default::default()
        }
    }

    fn show() -> MediaItem {
        let episode = Episode {
            season_number: 1,
            episode_number: 2,
            rating_key: "e".into(),
            title: String::new(),
            file: MediaFile {
                path: "/data/tv/Lost/Season 01/Lost - S01E02.mkv".into(),
                ..Default::default()
            },
        };
        let season = Season {
            season_number: 1,
            rating_key: "s".into(),
            title: String::new(),
            episodes: vec![episode],
        };
        MediaItem {
            series: Some(Series::from_seasons(vec![season], "/data/tv/Lost")),
            ..Default::default()
        }
    }

    fn file(image_type: ImageType) -> PosterFile {
        PosterFile {
            image_type,
            ..Default::default()
        }
    }

    #[test]
    fn season_folder_conventions() {
        assert_eq!(season_folder(3, 1), "Season 3");
        assert_eq!(season_folder(3, 2), "Season 03");
        assert_eq!(season_folder(0, 2), "Season 00");
        assert_eq!(season_folder(0, 1), "Season 0");
    }

    #[test]
    fn special_season_poster_uses_season_zero_folder() {
        let specials = PosterFile {
            season: Some(SeasonRef { number: 0 }),
            ..file(ImageType::SpecialSeasonPoster)
        };
        assert_eq!(
            local_destination(&show(), &specials, 2, None, None).unwrap(),
            PathBuf::from("/data/tv/Lost/Season 00/Season 00.jpg")
        );
        assert_eq!(
            local_destination(&show(), &specials, 1, None, None).unwrap(),
            PathBuf::from("/data/tv/Lost/Season 0/Season 0.jpg")
        );
    }

    #[test]
    fn movie_assets_sit_next_to_the_file() {
        assert_eq!(
            local_destination(&movie(), &file(ImageType::Poster), 2, None, None).unwrap(),
            PathBuf::from("/data/movies/Heat (1995)/poster.jpg")
        );
        assert_eq!(
            local_destination(&movie(), &file(ImageType::Backdrop), 2, None, None).unwrap(),
            PathBuf::from("/data/movies/Heat (1995)/backdrop.jpg")
        );
    }

    #[test]
    fn show_sub_assets() {
        let season = PosterFile {
            season: Some(SeasonRef { number: 1 }),
            ..file(ImageType::SeasonPoster)
        };
        assert_eq!(
            local_destination(&show(), &season, 2, None, None).unwrap(),
            PathBuf::from("/data/tv/Lost/Season 01/Season 01.jpg")
        );
        assert_eq!(
            local_destination(&show(), &season, 1, None, None).unwrap(),
            PathBuf::from("/data/tv/Lost/Season 1/Season 1.jpg")
        );

        let card = PosterFile {
            episode: Some(EpisodeRef {
                title: String::new(),
                season_number: 1,
                episode_number: 2,
            }),
            ..file(ImageType::Titlecard)
        };
        assert_eq!(
            local_destination(&show(), &card, 2, None, None).unwrap(),
            PathBuf::from("/data/tv/Lost/Season 01/Lost - S01E02.jpg")
        );

        let missing = PosterFile {
            episode: Some(EpisodeRef {
                title: String::new(),
                season_number: 4,
                episode_number: 1,
            }),
            ..file(ImageType::Titlecard)
        };
        assert!(local_destination(&show(), &missing, 2, None, None).is_none());
    }

    #[test]
    fn images_root_rewrites_library_root() {
        let root = Path::new("/images");
        assert_eq!(
            local_destination(&movie(), &file(ImageType::Poster), 2, Some(root), Some("/data/movies"))
                .unwrap(),
            PathBuf::from("/images/Heat (1995)/poster.jpg")
        );
        // Unknown library falls back to the item folder name.
        let season = PosterFile {
            season: Some(SeasonRef { number: 1 }),
            ..file(ImageType::SeasonPoster)
        };
        assert_eq!(
            local_destination(&show(), &season, 2, Some(root), None).unwrap(),
            PathBuf::from("/images/Lost/Season 01/Season 01.jpg")
        );
    }

    #[test]
    fn visibility_and_thumbs() {
        let mut images = ImagesConfig::default();
        assert!(!server_visible(&images));
        images.save_images_locally.enabled = true;
        assert!(server_visible(&images));
        assert!(images_root(&images).is_none());
        images.save_images_locally.path = "/images".into();
        assert!(!server_visible(&images));
        assert_eq!(images_root(&images), Some(Path::new("/images")));

        let paths = AppPaths::new("/config");
        assert_eq!(
            thumb_path(&paths, MediaServerType::Plex, "42", ImageType::Backdrop),
            paths.plex_images().join("42_backdrop.jpg")
        );
        assert_eq!(
            thumb_path(&paths, MediaServerType::Jellyfin, "7", ImageType::Titlecard),
            paths.emby_jellyfin_images().join("7_poster.jpg")
        );
    }
}
