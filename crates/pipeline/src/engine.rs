//! Change detection over stored subscriptions.
//!
//! One [`ChangeDetector::check_item`] call handles one stored item end to
//! end: resolve the latest server item, walk its subscriptions in order,
//! apply whatever is scheduled and persist the result. Nothing here runs
//! in parallel for the same item.

use aura_core::media::{MediaItem, MediaType};
use aura_core::poster::{ImageType, PosterSet, SetKind};
use aura_core::subscription::{MediaItemWithSubs, Subscription};
use aura_core::time::bump_last_downloaded;
use aura_db::repositories::SubscriptionRepo;
use aura_db::DbPool;
use chrono::Utc;

use crate::detection::{
    movie_changes, should_download_file, ScheduledDownload, ShowChanges, NO_UPDATES,
};
use crate::error::PipelineError;
use crate::executor::Executor;
use crate::results::{roll_up, ItemResult, OverallResult, SubscriptionOutcome, SubscriptionResult};

/// Reason detail for files applied from the download queue.
pub const MANUAL_REQUEST: &str = "Requested from download queue";

#[derive(Clone)]
pub struct ChangeDetector {
    db: DbPool,
    executor: Executor,
}

impl ChangeDetector {
    pub fn new(db: DbPool, executor: Executor) -> Self {
        Self { db, executor }
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    // -- latest item -------------------------------------------------------

    /// Fetch the current server copy of `stored`.
    ///
    /// The cached rating key is tried first, then the stored one. The result
    /// must keep the stored identity and is written back to the cache.
    pub async fn latest_item(&self, stored: &MediaItem) -> Result<MediaItem, PipelineError> {
        let cached = self
            .executor
            .cache()
            .get_item_by_tmdb(&stored.library_title, &stored.tmdb_id)
            .await
            .map(|item| item.rating_key)
            .filter(|key| !key.is_empty());
        let mut keys: Vec<String> = cached.into_iter().collect();
        if !stored.rating_key.is_empty() && !keys.contains(&stored.rating_key) {
            keys.push(stored.rating_key.clone());
        }

        let mut last_error = None;
        let mut found = None;
        for key in &keys {
            match self
                .executor
                .server()
                .fetch_item_content(key, &stored.library_title)
                .await
            {
                Ok(item) => {
                    found = Some(item);
                    break;
                }
                Err(e) => {
                    tracing::debug!(rating_key = %key, error = %e, "Rating key did not resolve");
                    last_error = Some(e);
                }
            }
        }
        let mut latest = match (found, last_error) {
            (Some(item), _) => item,
            (None, Some(e)) => return Err(e.into()),
            (None, None) => {
                return Err(PipelineError::MissingTarget(format!(
                    "rating key of {}",
                    stored.key()
                )))
            }
        };

        if latest.tmdb_id.is_empty() {
            latest.tmdb_id = stored.tmdb_id.clone();
        }
        if latest.library_title.is_empty() {
            latest.library_title = stored.library_title.clone();
        }
        if latest.key() != stored.key() {
            return Err(PipelineError::Conflict(format!(
                "{} is now {}",
                stored.key(),
                latest.key()
            )));
        }

        self.executor
            .cache()
            .upsert_media_item(&latest.library_title, latest.clone())
            .await;
        Ok(latest)
    }

    // -- change detection --------------------------------------------------

    /// Run change detection for one stored item. `force` treats every set as
    /// updated, as for a push from upstream.
    pub async fn check_item(&self, record: &MediaItemWithSubs, force: bool) -> ItemResult {
        let stored = &record.media_item;
        if record.ignored {
            return finish(stored, vec![], Some("Item is ignored"));
        }
        let latest = match self.latest_item(stored).await {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!(item = %stored.key(), title = %stored.title, error = %e, "Failed to fetch latest item");
                return ItemResult::failed(
                    &stored.tmdb_id,
                    &stored.library_title,
                    &stored.title,
                    format!("Failed to fetch latest item: {e}"),
                );
            }
        };

        let result = match stored.media_type {
            MediaType::Movie => self.check_movie(record, latest).await,
            MediaType::Show => self.check_show(record, latest, force).await,
        };
        tracing::info!(
            item = %stored.key(),
            title = %stored.title,
            overall = ?result.overall,
            message = %result.message,
            "Change check finished"
        );
        result
    }

    async fn check_movie(&self, record: &MediaItemWithSubs, latest: MediaItem) -> ItemResult {
        let stored = &record.media_item;
        let Some(change) = movie_changes(stored, &latest) else {
            return finish(stored, vec![], Some("No changes to rating key or file path"));
        };

        let mut updated = record.clone();
        updated.media_item = latest;
        let mut results = Vec::with_capacity(updated.subscriptions.len());
        for sub in updated.subscriptions.iter_mut() {
            let scheduled: Vec<ScheduledDownload> = sub
                .poster_set
                .candidate_files(&sub.selected_types)
                .iter()
                .filter(|f| matches!(f.effective_type(), ImageType::Poster | ImageType::Backdrop))
                .map(|f| ScheduledDownload::redownload(f, change.as_str()))
                .collect();
            if scheduled.is_empty() {
                results.push(SubscriptionResult::skipped(
                    sub.poster_set_id(),
                    "No poster or backdrop selected",
                ));
                continue;
            }
            results.push(self.apply_all(&updated.media_item, sub, &scheduled).await);
        }

        if let Err(e) = self.persist(&updated).await {
            return persist_failed(&updated.media_item, results, e);
        }
        let mut result = finish(&updated.media_item, results, None);
        if result.overall == OverallResult::Success {
            result.overall = OverallResult::Redownloaded;
            result.message = change;
        }
        result
    }

    async fn check_show(
        &self,
        record: &MediaItemWithSubs,
        latest: MediaItem,
        force: bool,
    ) -> ItemResult {
        let stored = &record.media_item;
        let rating_key_changed = stored.rating_key != latest.rating_key;

        let mut updated = record.clone();
        updated.media_item = latest;
        let mut results = Vec::with_capacity(updated.subscriptions.len());
        for sub in updated.subscriptions.iter_mut() {
            let result = self
                .check_show_subscription(stored, &updated.media_item, sub, rating_key_changed, force)
                .await;
            results.push(result);
        }

        let any_success = results
            .iter()
            .any(|r| r.result == SubscriptionOutcome::Success);
        if any_success || rating_key_changed {
            if let Err(e) = self.persist(&updated).await {
                return persist_failed(&updated.media_item, results, e);
            }
        }
        finish(&updated.media_item, results, None)
    }

    async fn check_show_subscription(
        &self,
        stored: &MediaItem,
        latest: &MediaItem,
        sub: &mut Subscription,
        rating_key_changed: bool,
        force: bool,
    ) -> SubscriptionResult {
        let set_id = sub.poster_set_id().to_string();
        if !sub.auto_download && !rating_key_changed {
            return SubscriptionResult::skipped(&set_id, "Auto download is disabled");
        }
        if sub.selected_types.is_empty() {
            return SubscriptionResult::skipped(&set_id, "No image types selected");
        }

        let set = match self.fetch_set(&stored.tmdb_id, &set_id).await {
            Ok(set) => set,
            Err(reason) => {
                tracing::warn!(item = %stored.key(), set_id = %set_id, reason = %reason, "Set refetch failed");
                return SubscriptionResult::error(&set_id, reason);
            }
        };

        let changes = ShowChanges::detect(stored, latest, &set, &sub.last_downloaded, force);
        if !changes.any() {
            return SubscriptionResult::skipped(&set_id, NO_UPDATES);
        }
        tracing::debug!(set_id = %set_id, ?changes, "Subscription has changes");

        let scheduled: Vec<ScheduledDownload> = set
            .candidate_files(&sub.selected_types)
            .iter()
            .filter_map(|f| should_download_file(stored, latest, f, &sub.last_downloaded))
            .map(|s| {
                if rating_key_changed {
                    s.after_rating_key_change()
                } else {
                    s
                }
            })
            .collect();
        if scheduled.is_empty() {
            return SubscriptionResult::skipped(&set_id, "No files needed downloading");
        }

        let result = self.apply_all(latest, sub, &scheduled).await;
        if result.result == SubscriptionOutcome::Success {
            sub.poster_set = set;
        }
        result
    }

    /// Latest revision of a show set, or the subscription's error reason.
    async fn fetch_set(&self, tmdb_id: &str, set_id: &str) -> Result<PosterSet, String> {
        match self
            .executor
            .source()
            .fetch_set_by_id(SetKind::Show, tmdb_id, set_id)
            .await
        {
            Ok(Some(set)) if !set.id.is_empty() => Ok(set),
            Ok(_) => Err(format!(
                "Error fetching updated set {set_id}: it may have been deleted"
            )),
            Err(e) => Err(format!("Error fetching updated set {set_id}: {e}")),
        }
    }

    // -- manual queue ------------------------------------------------------

    /// Apply every selected file of every subscription, regardless of what
    /// changed. Used for download-queue entries.
    pub async fn apply_unconditionally(&self, record: &MediaItemWithSubs) -> ItemResult {
        let stored = &record.media_item;
        let latest = match self.latest_item(stored).await {
            Ok(item) => item,
            Err(e) => {
                return ItemResult::failed(
                    &stored.tmdb_id,
                    &stored.library_title,
                    &stored.title,
                    format!("Failed to fetch latest item: {e}"),
                )
            }
        };

        let mut updated = record.clone();
        updated.media_item = latest;
        updated.ignored = false;
        let mut results = Vec::with_capacity(updated.subscriptions.len());
        for sub in updated.subscriptions.iter_mut() {
            let scheduled: Vec<ScheduledDownload> = sub
                .poster_set
                .candidate_files(&sub.selected_types)
                .iter()
                .map(|f| ScheduledDownload::new(f, MANUAL_REQUEST))
                .collect();
            if scheduled.is_empty() {
                results.push(SubscriptionResult::skipped(
                    sub.poster_set_id(),
                    "No files for the selected types",
                ));
                continue;
            }
            results.push(self.apply_all(&updated.media_item, sub, &scheduled).await);
        }

        if let Err(e) = self.persist(&updated).await {
            return persist_failed(&updated.media_item, results, e);
        }
        finish(&updated.media_item, results, None)
    }

    // -- helpers -----------------------------------------------------------

    /// Apply files in order, stopping at the first failure. On success the
    /// subscription's `last_downloaded` moves past every applied file.
    async fn apply_all(
        &self,
        item: &MediaItem,
        sub: &mut Subscription,
        scheduled: &[ScheduledDownload],
    ) -> SubscriptionResult {
        let set_id = sub.poster_set_id().to_string();
        let mut applied = Vec::with_capacity(scheduled.len());
        for s in scheduled {
            if let Err(e) = self.executor.apply(item, s, &sub.selected_types).await {
                tracing::warn!(
                    item = %item.key(),
                    set_id = %set_id,
                    file = %s.file.describe(),
                    error = %e,
                    "Apply failed"
                );
                return SubscriptionResult::error(
                    &set_id,
                    format!("Failed to apply {}: {e}", s.file.describe()),
                );
            }
            applied.push(s.file.describe());
        }

        if let Some(newest) = scheduled.iter().map(|s| s.file.modified).max() {
            sub.last_downloaded = bump_last_downloaded(&Utc::now(), &newest);
        }
        let reason = match scheduled {
            [only] => format!("{}: {}", only.reason_title, only.reason_detail),
            _ => format!("Applied {} files", scheduled.len()),
        };
        SubscriptionResult::success(&set_id, reason, applied)
    }

    async fn persist(&self, record: &MediaItemWithSubs) -> Result<(), PipelineError> {
        SubscriptionRepo::upsert_all(&self.db, record).await?;
        Ok(())
    }
}

fn finish(item: &MediaItem, subscriptions: Vec<SubscriptionResult>, reason: Option<&str>) -> ItemResult {
    let (overall, message) = match reason {
        Some(reason) => (OverallResult::Skipped, reason.to_string()),
        None => roll_up(&subscriptions),
    };
    ItemResult {
        tmdb_id: item.tmdb_id.clone(),
        library_title: item.library_title.clone(),
        title: item.title.clone(),
        overall,
        message,
        subscriptions,
    }
}

fn persist_failed(
    item: &MediaItem,
    subscriptions: Vec<SubscriptionResult>,
    err: PipelineError,
) -> ItemResult {
    tracing::error!(item = %item.key(), error = %err, "Failed to save item");
    ItemResult {
        overall: OverallResult::Error,
        message: format!("Failed to save item: {err}"),
        ..finish(item, subscriptions, None)
    }
}
