//! Repository for the `MediaItems`, `PosterSets` and `SavedItems` tables.
//!
//! Every write runs in one transaction per media item.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use aura_core::media::MediaItem;
use aura_core::poster::SelectedTypes;
use aura_core::subscription::{MediaItemWithSubs, PosterSetSummary, Subscription};
use aura_core::types::ItemKey;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::error::DbError;
use crate::models::{
    to_json, ItemProjection, JoinedRow, ITEM_COLUMNS, SUBSCRIPTION_COLUMNS,
};
use crate::query::{
    AutoDownloadFilter, Pagination, QueryPage, Sort, SubscriptionFilter, SELECTED_TYPE_NONE,
    USER_NONE,
};

const JOIN: &str = "FROM MediaItems m \
    LEFT JOIN PosterSets ps ON ps.TMDB_ID = m.TMDB_ID AND ps.LibraryTitle = m.LibraryTitle";

/// Provides persistence for subscriptions and the media items they belong to.
pub struct SubscriptionRepo;

impl SubscriptionRepo {
    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Persist an item and reconcile its subscriptions, atomically.
    ///
    /// Stored subscriptions missing from `item` lose every type the incoming
    /// subscriptions select; those left with no types are deleted.
    pub async fn upsert_all(pool: &SqlitePool, item: &MediaItemWithSubs) -> Result<(), DbError> {
        item.validate()?;
        let mut tx = pool.begin().await?;
        Self::upsert_all_in(&mut tx, item).await?;
        tx.commit().await?;
        tracing::debug!(
            tmdb_id = %item.media_item.tmdb_id,
            library = %item.media_item.library_title,
            subscriptions = item.subscriptions.len(),
            "Saved media item",
        );
        Ok(())
    }

    pub(crate) async fn upsert_all_in(
        conn: &mut SqliteConnection,
        item: &MediaItemWithSubs,
    ) -> Result<(), DbError> {
        let key = item.key();

        upsert_item_in(conn, &item.media_item, false).await?;

        let stored: Vec<(String, Option<String>)> = sqlx::query_as(
            "SELECT PosterSetID, SelectedTypes FROM PosterSets \
             WHERE TMDB_ID = ? AND LibraryTitle = ? ORDER BY rowid",
        )
        .bind(&key.tmdb_id)
        .bind(&key.library_title)
        .fetch_all(&mut *conn)
        .await?;

        let incoming_ids: HashSet<&str> = item
            .subscriptions
            .iter()
            .map(|s| s.poster_set_id())
            .collect();
        let incoming_types = item.all_selected_types();

        for (set_id, csv) in stored {
            if incoming_ids.contains(set_id.as_str()) {
                continue;
            }
            let remaining =
                SelectedTypes::from_csv(csv.as_deref().unwrap_or("")).difference(&incoming_types);
            if remaining.is_empty() {
                delete_subscription_in(conn, &key, &set_id).await?;
            } else {
                sqlx::query(
                    "UPDATE PosterSets SET SelectedTypes = ? \
                     WHERE PosterSetID = ? AND TMDB_ID = ? AND LibraryTitle = ?",
                )
                .bind(remaining.to_csv())
                .bind(&set_id)
                .bind(&key.tmdb_id)
                .bind(&key.library_title)
                .execute(&mut *conn)
                .await?;
            }
        }

        for sub in &item.subscriptions {
            if sub.selected_types.is_empty() {
                delete_subscription_in(conn, &key, sub.poster_set_id()).await?;
                continue;
            }
            upsert_subscription_in(conn, &key, sub).await?;
        }
        Ok(())
    }

    /// Delete one subscription, or every subscription when `poster_set_id`
    /// is `None`. The media item goes with its last subscription.
    ///
    /// Returns `true` if anything was removed.
    pub async fn delete(
        pool: &SqlitePool,
        tmdb_id: &str,
        library_title: &str,
        poster_set_id: Option<&str>,
    ) -> Result<bool, DbError> {
        let key = ItemKey::new(tmdb_id, library_title);
        let mut tx = pool.begin().await?;

        let mut removed = match poster_set_id {
            Some(set_id) => delete_subscription_in(&mut tx, &key, set_id).await?,
            None => {
                sqlx::query("DELETE FROM SavedItems WHERE TMDB_ID = ? AND LibraryTitle = ?")
                    .bind(&key.tmdb_id)
                    .bind(&key.library_title)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM PosterSets WHERE TMDB_ID = ? AND LibraryTitle = ?")
                    .bind(&key.tmdb_id)
                    .bind(&key.library_title)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected()
                    > 0
            }
        };

        let remaining: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM PosterSets WHERE TMDB_ID = ? AND LibraryTitle = ?",
        )
        .bind(&key.tmdb_id)
        .bind(&key.library_title)
        .fetch_one(&mut *tx)
        .await?;

        if remaining == 0 {
            let result = sqlx::query("DELETE FROM MediaItems WHERE TMDB_ID = ? AND LibraryTitle = ?")
                .bind(&key.tmdb_id)
                .bind(&key.library_title)
                .execute(&mut *tx)
                .await?;
            removed |= result.rows_affected() > 0;
        }

        tx.commit().await?;
        Ok(removed)
    }

    /// Mark an item as ignored: store it without subscriptions so the sweep
    /// and queries skip it. A later [`Self::upsert_all`] clears the mark.
    pub async fn set_ignored(pool: &SqlitePool, item: &MediaItem) -> Result<(), DbError> {
        item.validate()?;
        let key = item.key();
        let mut tx = pool.begin().await?;
        upsert_item_in(&mut tx, item, true).await?;
        sqlx::query("DELETE FROM SavedItems WHERE TMDB_ID = ? AND LibraryTitle = ?")
            .bind(&key.tmdb_id)
            .bind(&key.library_title)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM PosterSets WHERE TMDB_ID = ? AND LibraryTitle = ?")
            .bind(&key.tmdb_id)
            .bind(&key.library_title)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::info!(tmdb_id = %key.tmdb_id, library = %key.library_title, "Item ignored");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Whether the item is stored, and the subscriptions attached to it.
    pub async fn exists(
        pool: &SqlitePool,
        tmdb_id: &str,
        library_title: &str,
    ) -> Result<(bool, Vec<PosterSetSummary>), DbError> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM MediaItems WHERE TMDB_ID = ? AND LibraryTitle = ?)",
        )
        .bind(tmdb_id)
        .bind(library_title)
        .fetch_one(pool)
        .await?;

        let rows: Vec<(String, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT PosterSetID, PosterSetUser, SelectedTypes FROM PosterSets \
             WHERE TMDB_ID = ? AND LibraryTitle = ? ORDER BY rowid",
        )
        .bind(tmdb_id)
        .bind(library_title)
        .fetch_all(pool)
        .await?;

        let summaries = rows
            .into_iter()
            .map(|(poster_set_id, user, csv)| PosterSetSummary {
                poster_set_id,
                poster_set_user: user.unwrap_or_default(),
                selected_types: SelectedTypes::from_csv(csv.as_deref().unwrap_or("")),
            })
            .collect();
        Ok((found, summaries))
    }

    /// Load one item with all its subscriptions.
    pub async fn get(
        pool: &SqlitePool,
        tmdb_id: &str,
        library_title: &str,
    ) -> Result<Option<MediaItemWithSubs>, DbError> {
        let mut conn = pool.acquire().await?;
        let mut items = fetch_items_in(&mut conn, &[ItemKey::new(tmdb_id, library_title)]).await?;
        Ok(items.pop())
    }

    /// Every item holding a subscription to `poster_set_id`.
    pub async fn list_by_poster_set(
        pool: &SqlitePool,
        poster_set_id: &str,
    ) -> Result<Vec<MediaItemWithSubs>, DbError> {
        let mut tx = pool.begin().await?;
        let keys: Vec<(String, String)> = sqlx::query_as(
            "SELECT DISTINCT TMDB_ID, LibraryTitle FROM PosterSets WHERE PosterSetID = ? \
             ORDER BY TMDB_ID, LibraryTitle",
        )
        .bind(poster_set_id)
        .fetch_all(&mut *tx)
        .await?;
        let keys: Vec<ItemKey> = keys.into_iter().map(|(t, l)| ItemKey::new(t, l)).collect();
        let items = fetch_items_in(&mut tx, &keys).await?;
        tx.commit().await?;
        Ok(items)
    }

    /// Filtered, sorted, paginated listing of items and their subscriptions.
    ///
    /// Page keys are selected first so an item is never split across pages;
    /// both phases share one transaction and therefore one snapshot.
    pub async fn query(
        pool: &SqlitePool,
        filter: &SubscriptionFilter,
        page: Pagination,
        sort: Sort,
    ) -> Result<QueryPage, DbError> {
        let mut tx = pool.begin().await?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM (");
        push_keys_select(&mut count, filter);
        count.push(")");
        let total: i64 = count.build_query_scalar().fetch_one(&mut *tx).await?;

        let mut keys_query = QueryBuilder::<Sqlite>::new("");
        push_keys_select(&mut keys_query, filter);
        keys_query.push(" ORDER BY ");
        keys_query.push(sort.order_by());
        keys_query.push(" LIMIT ");
        keys_query.push_bind(page.limit());
        keys_query.push(" OFFSET ");
        keys_query.push_bind(page.offset());
        let keys: Vec<(String, String)> = keys_query.build_query_as().fetch_all(&mut *tx).await?;
        let keys: Vec<ItemKey> = keys.into_iter().map(|(t, l)| ItemKey::new(t, l)).collect();

        let items = fetch_items_in(&mut tx, &keys).await?;

        let distinct_users: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT PosterSetUser FROM PosterSets \
             WHERE COALESCE(PosterSetUser, '') <> '' ORDER BY PosterSetUser COLLATE NOCASE",
        )
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(QueryPage {
            items,
            total,
            distinct_users,
        })
    }
}

// ---------------------------------------------------------------------------
// Connection-level statements, shared with migrations
// ---------------------------------------------------------------------------

pub(crate) async fn upsert_item_in(
    conn: &mut SqliteConnection,
    item: &MediaItem,
    ignored: bool,
) -> Result<(), DbError> {
    let projection = ItemProjection::of(item)?;
    sqlx::query(
        "INSERT INTO MediaItems \
            (TMDB_ID, LibraryTitle, RatingKey, Type, Title, Year, Thumb, ContentRating, \
             Summary, UpdatedAt, AddedAt, ReleasedAt, Guids_JSON, Movie_JSON, Series_JSON, \
             Full_JSON, Ignored) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (TMDB_ID, LibraryTitle) DO UPDATE SET \
            RatingKey = excluded.RatingKey, Type = excluded.Type, Title = excluded.Title, \
            Year = excluded.Year, Thumb = excluded.Thumb, \
            ContentRating = excluded.ContentRating, Summary = excluded.Summary, \
            UpdatedAt = excluded.UpdatedAt, AddedAt = excluded.AddedAt, \
            ReleasedAt = excluded.ReleasedAt, Guids_JSON = excluded.Guids_JSON, \
            Movie_JSON = excluded.Movie_JSON, Series_JSON = excluded.Series_JSON, \
            Full_JSON = excluded.Full_JSON, Ignored = excluded.Ignored",
    )
    .bind(&item.tmdb_id)
    .bind(&item.library_title)
    .bind(&item.rating_key)
    .bind(item.media_type.as_str())
    .bind(&item.title)
    .bind(item.year)
    .bind(&item.thumb)
    .bind(&item.content_rating)
    .bind(&item.summary)
    .bind(item.updated_at)
    .bind(item.added_at)
    .bind(item.released_at)
    .bind(&projection.guids_json)
    .bind(&projection.movie_json)
    .bind(&projection.series_json)
    .bind(&projection.full_json)
    .bind(ignored)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn upsert_subscription_in(
    conn: &mut SqliteConnection,
    key: &ItemKey,
    sub: &Subscription,
) -> Result<(), DbError> {
    let set_json = to_json("PosterSet_JSON", &sub.poster_set)?;
    sqlx::query(
        "INSERT INTO PosterSets \
            (PosterSetID, TMDB_ID, LibraryTitle, PosterSetUser, PosterSet_JSON, \
             LastDownloaded, SelectedTypes, AutoDownload) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (PosterSetID, TMDB_ID, LibraryTitle) DO UPDATE SET \
            PosterSetUser = excluded.PosterSetUser, PosterSet_JSON = excluded.PosterSet_JSON, \
            LastDownloaded = excluded.LastDownloaded, SelectedTypes = excluded.SelectedTypes, \
            AutoDownload = excluded.AutoDownload",
    )
    .bind(sub.poster_set_id())
    .bind(&key.tmdb_id)
    .bind(&key.library_title)
    .bind(sub.poster_set_user())
    .bind(&set_json)
    .bind(&sub.last_downloaded)
    .bind(sub.selected_types.to_csv())
    .bind(sub.auto_download)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "INSERT OR IGNORE INTO SavedItems (TMDB_ID, LibraryTitle, PosterSetID) VALUES (?, ?, ?)",
    )
    .bind(&key.tmdb_id)
    .bind(&key.library_title)
    .bind(sub.poster_set_id())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn delete_subscription_in(
    conn: &mut SqliteConnection,
    key: &ItemKey,
    poster_set_id: &str,
) -> Result<bool, DbError> {
    sqlx::query("DELETE FROM SavedItems WHERE TMDB_ID = ? AND LibraryTitle = ? AND PosterSetID = ?")
        .bind(&key.tmdb_id)
        .bind(&key.library_title)
        .bind(poster_set_id)
        .execute(&mut *conn)
        .await?;
    let result = sqlx::query(
        "DELETE FROM PosterSets WHERE TMDB_ID = ? AND LibraryTitle = ? AND PosterSetID = ?",
    )
    .bind(&key.tmdb_id)
    .bind(&key.library_title)
    .bind(poster_set_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Load items by key, grouping joined rows. Result order follows `keys`;
/// subscriptions keep their row order.
async fn fetch_items_in(
    conn: &mut SqliteConnection,
    keys: &[ItemKey],
) -> Result<Vec<MediaItemWithSubs>, DbError> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {ITEM_COLUMNS}, {SUBSCRIPTION_COLUMNS} {JOIN} WHERE "
    ));
    let mut keys_sql = qb.separated(" OR ");
    for key in keys {
        keys_sql.push("(m.TMDB_ID = ");
        keys_sql.push_bind_unseparated(key.tmdb_id.clone());
        keys_sql.push_unseparated(" AND m.LibraryTitle = ");
        keys_sql.push_bind_unseparated(key.library_title.clone());
        keys_sql.push_unseparated(")");
    }
    qb.push(" ORDER BY ps.rowid");

    let rows: Vec<JoinedRow> = qb.build_query_as().fetch_all(&mut *conn).await?;

    let mut grouped: HashMap<ItemKey, MediaItemWithSubs> = HashMap::with_capacity(keys.len());
    for JoinedRow { item, subscription } in rows {
        let key = ItemKey::new(item.tmdb_id.clone(), item.library_title.clone());
        let entry = match grouped.entry(key) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let ignored = item.ignored;
                e.insert(MediaItemWithSubs {
                    media_item: item.into_media_item()?,
                    subscriptions: Vec::new(),
                    ignored,
                })
            }
        };
        if let Some(sub) = subscription.into_subscription()? {
            entry.subscriptions.push(sub);
        }
    }

    Ok(keys.iter().filter_map(|k| grouped.remove(k)).collect())
}

/// `%needle%` with LIKE wildcards in `needle` matched literally.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// `SELECT <keys> ... GROUP BY` with every filter applied.
fn push_keys_select(qb: &mut QueryBuilder<'_, Sqlite>, filter: &SubscriptionFilter) {
    qb.push("SELECT m.TMDB_ID, m.LibraryTitle ");
    qb.push(JOIN);
    qb.push(" WHERE 1 = 1");

    if !filter.include_ignored {
        qb.push(" AND m.Ignored = 0");
    }
    if let Some(tmdb_id) = &filter.tmdb_id {
        qb.push(" AND m.TMDB_ID = ");
        qb.push_bind(tmdb_id.clone());
    }
    if let Some(library) = &filter.library_contains {
        qb.push(" AND m.LibraryTitle LIKE ");
        qb.push_bind(contains_pattern(library));
        qb.push(" ESCAPE '\\'");
    }
    if let Some(year) = filter.year {
        qb.push(" AND m.Year = ");
        qb.push_bind(year);
    }
    if let Some(title) = &filter.title_contains {
        qb.push(" AND m.Title LIKE ");
        qb.push_bind(contains_pattern(title));
        qb.push(" ESCAPE '\\'");
    }
    if !filter.sections.is_empty() {
        qb.push(" AND m.LibraryTitle IN (");
        let mut sections = qb.separated(", ");
        for section in &filter.sections {
            sections.push_bind(section.clone());
        }
        qb.push(")");
    }
    if !filter.selected_types.is_empty() {
        qb.push(" AND (");
        for (i, image_type) in filter.selected_types.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            if image_type == SELECTED_TYPE_NONE {
                qb.push("COALESCE(ps.SelectedTypes, '') = ''");
            } else {
                qb.push("instr(',' || ps.SelectedTypes || ',', ");
                qb.push_bind(format!(",{image_type},"));
                qb.push(") > 0");
            }
        }
        qb.push(")");
    }
    match filter.auto_download {
        AutoDownloadFilter::All => {}
        AutoDownloadFilter::On => {
            qb.push(" AND ps.AutoDownload = 1");
        }
        AutoDownloadFilter::Off => {
            qb.push(" AND ps.AutoDownload = 0");
        }
    }
    if !filter.users.is_empty() {
        qb.push(" AND (");
        for (i, user) in filter.users.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            if user == USER_NONE {
                qb.push("COALESCE(ps.PosterSetUser, '') = ''");
            } else {
                qb.push("ps.PosterSetUser = ");
                qb.push_bind(user.clone());
            }
        }
        qb.push(")");
    }

    qb.push(" GROUP BY m.TMDB_ID, m.LibraryTitle");
    if filter.multi_set_only {
        qb.push(" HAVING COUNT(DISTINCT ps.PosterSetID) > 1");
    }
}
