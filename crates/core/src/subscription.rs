//! Subscriptions: the persisted link between a media item and a poster set.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::media::MediaItem;
use crate::poster::{PosterSet, SelectedTypes};
use crate::types::ItemKey;

/// One (media item, poster set) subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub poster_set: PosterSet,
    pub selected_types: SelectedTypes,
    #[serde(default)]
    pub auto_download: bool,
    /// RFC-3339; see [`crate::time::is_older`].
    #[serde(default)]
    pub last_downloaded: String,
}

impl Subscription {
    pub fn poster_set_id(&self) -> &str {
        &self.poster_set.id
    }

    pub fn poster_set_user(&self) -> &str {
        &self.poster_set.user.name
    }

    pub fn summary(&self) -> PosterSetSummary {
        PosterSetSummary {
            poster_set_id: self.poster_set.id.clone(),
            poster_set_user: self.poster_set.user.name.clone(),
            selected_types: self.selected_types.clone(),
        }
    }
}

/// A media item together with every subscription attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItemWithSubs {
    pub media_item: MediaItem,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
    /// The user chose to stop tracking this item. Ignored items carry no
    /// subscriptions and are skipped by the sweep.
    #[serde(default)]
    pub ignored: bool,
}

impl MediaItemWithSubs {
    pub fn new(media_item: MediaItem, subscriptions: Vec<Subscription>) -> Self {
        Self {
            media_item,
            subscriptions,
            ignored: false,
        }
    }

    pub fn key(&self) -> ItemKey {
        self.media_item.key()
    }

    /// Structural checks before the record is written.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.media_item.validate()?;
        for sub in &self.subscriptions {
            if sub.poster_set.id.trim().is_empty() {
                return Err(CoreError::Validation(format!(
                    "Subscription for '{}' has no poster set id",
                    self.media_item.title
                )));
            }
        }
        Ok(())
    }

    /// Union of the selected types across all subscriptions.
    pub fn all_selected_types(&self) -> SelectedTypes {
        self.subscriptions
            .iter()
            .fold(SelectedTypes::default(), |acc, s| acc.union(&s.selected_types))
    }
}

/// Lightweight view of a stored subscription, returned by existence checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosterSetSummary {
    pub poster_set_id: String,
    pub poster_set_user: String,
    pub selected_types: SelectedTypes,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::fixtures::show;
    use crate::poster::{ImageType, SetUser};

    fn sub(id: &str, types: &[ImageType]) -> Subscription {
        Subscription {
            poster_set: PosterSet {
                id: id.into(),
                user: SetUser { name: "willtong93".into() },
                ..Default::default()
            },
            selected_types: SelectedTypes::new(types.iter().copied()),
            auto_download: true,
            last_downloaded: "2024-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn validate_rejects_blank_set_id() {
        let item = MediaItemWithSubs::new(
            show("1399", "TV", "100", &[1]),
            vec![sub(" ", &[ImageType::Poster])],
        );
        assert!(item.validate().is_err());
    }

    #[test]
    fn all_selected_types_unions_subscriptions() {
        let item = MediaItemWithSubs::new(
            show("1399", "TV", "100", &[1]),
            vec![
                sub("a", &[ImageType::Poster]),
                sub("b", &[ImageType::Titlecard, ImageType::Poster]),
            ],
        );
        assert_eq!(item.all_selected_types().to_csv(), "poster,titlecard");
    }

    #[test]
    fn summary_carries_user() {
        let s = sub("a", &[ImageType::Backdrop]).summary();
        assert_eq!(s.poster_set_id, "a");
        assert_eq!(s.poster_set_user, "willtong93");
        assert_eq!(s.selected_types.to_csv(), "backdrop");
    }
}
