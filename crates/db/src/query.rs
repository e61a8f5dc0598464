//! Filter, pagination and sort parameters for subscription queries.

use aura_core::subscription::MediaItemWithSubs;
use serde::{Deserialize, Serialize};

/// Selected-type filter value matching items with no selected types.
pub const SELECTED_TYPE_NONE: &str = "none";

/// User filter value matching sets without an author.
pub const USER_NONE: &str = "no-user";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoDownloadFilter {
    #[default]
    All,
    On,
    Off,
}

/// Every filter is optional; an empty list means "no constraint".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionFilter {
    pub tmdb_id: Option<String>,
    /// Case-insensitive substring of the library title.
    pub library_contains: Option<String>,
    pub year: Option<i32>,
    pub title_contains: Option<String>,
    pub sections: Vec<String>,
    /// Any-of; may contain [`SELECTED_TYPE_NONE`].
    pub selected_types: Vec<String>,
    pub auto_download: AutoDownloadFilter,
    /// Only items subscribed to more than one set.
    pub multi_set_only: bool,
    /// Any-of; may contain [`USER_NONE`].
    pub users: Vec<String>,
    pub include_ignored: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// 1-based.
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size.max(1))
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * self.limit()
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Title,
    /// Release date, falling back to January 1st of the item's year.
    Year,
    Library,
    LastDownloaded,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: SortField,
    pub order: SortOrder,
}

impl Sort {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }

    pub(crate) fn order_by(&self) -> String {
        let expr = match self.field {
            SortField::Title => "m.Title COLLATE NOCASE",
            SortField::Year => {
                "CASE WHEN COALESCE(m.ReleasedAt, 0) > 0 THEN m.ReleasedAt \
                 ELSE CAST(strftime('%s', printf('%04d-01-01', COALESCE(m.Year, 0))) AS INTEGER) END"
            }
            SortField::Library => "m.LibraryTitle COLLATE NOCASE",
            SortField::LastDownloaded => "MAX(ps.LastDownloaded)",
        };
        let dir = match self.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        format!("{expr} {dir}, m.Title COLLATE NOCASE ASC, m.TMDB_ID ASC, m.LibraryTitle ASC")
    }
}

/// One page of grouped query results.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryPage {
    pub items: Vec<MediaItemWithSubs>,
    /// Number of matching items across all pages.
    pub total: i64,
    /// Every set author in the store, for filter pickers.
    pub distinct_users: Vec<String>,
}
