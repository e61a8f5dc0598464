//! Scheduled auto-download sweep.
//!
//! On every cron tick the library cache is refreshed and every stored,
//! non-ignored item goes through change detection. A tick that fires while
//! the previous sweep is still running is skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use aura_core::config::LibraryConfig;
use aura_db::query::{Pagination, Sort, SortField, SortOrder, SubscriptionFilter};
use aura_db::repositories::SubscriptionRepo;
use aura_db::{DbError, DbPool};
use aura_pipeline::{ChangeDetector, ItemResult, OverallResult};
use chrono::Utc;
use croner::Cron;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::warmer;

/// Items read from the store per page.
pub const PAGE_SIZE: u32 = 500;

/// Items checked concurrently within one page.
pub const CONCURRENCY: usize = 4;

/// Per-sweep tally of item verdicts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub items: usize,
    pub success: usize,
    pub warn: usize,
    pub error: usize,
    pub skipped: usize,
    pub redownloaded: usize,
}

impl SweepSummary {
    fn record(&mut self, result: &ItemResult) {
        self.items += 1;
        match result.overall {
            OverallResult::Success => self.success += 1,
            OverallResult::Warn => self.warn += 1,
            OverallResult::Error => self.error += 1,
            OverallResult::Skipped => self.skipped += 1,
            OverallResult::Redownloaded => self.redownloaded += 1,
        }
    }
}

pub struct Sweep {
    db: DbPool,
    detector: ChangeDetector,
    libraries: Vec<LibraryConfig>,
    running: AtomicBool,
}

impl Sweep {
    pub fn new(db: DbPool, detector: ChangeDetector, libraries: Vec<LibraryConfig>) -> Self {
        Self {
            db,
            detector,
            libraries,
            running: AtomicBool::new(false),
        }
    }

    /// Run one sweep now. `None` if another sweep is in progress.
    pub async fn run_once(&self) -> Option<Result<SweepSummary, DbError>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("Auto-download sweep already running, skipping tick");
            return None;
        }
        let result = self.sweep().await;
        self.running.store(false, Ordering::Release);
        Some(result)
    }

    async fn sweep(&self) -> Result<SweepSummary, DbError> {
        let executor = self.detector.executor();
        warmer::warm_libraries(executor.server().as_ref(), executor.cache(), &self.libraries).await;

        let filter = SubscriptionFilter::default();
        let sort = Sort::new(SortField::Title, SortOrder::Asc);
        let mut summary = SweepSummary::default();
        let mut page = 1;
        loop {
            let batch =
                SubscriptionRepo::query(&self.db, &filter, Pagination::new(page, PAGE_SIZE), sort)
                    .await?;
            let fetched = batch.items.len();
            let results: Vec<ItemResult> = futures::stream::iter(batch.items)
                .map(|record| {
                    let detector = &self.detector;
                    async move { detector.check_item(&record, false).await }
                })
                .buffer_unordered(CONCURRENCY)
                .collect()
                .await;
            for result in &results {
                summary.record(result);
            }

            let seen = i64::from(page) * i64::from(PAGE_SIZE);
            if fetched == 0 || seen >= batch.total {
                break;
            }
            page += 1;
        }
        Ok(summary)
    }

    /// Run a sweep at every occurrence of `cron` until `cancel` fires.
    pub async fn run(self: Arc<Self>, cron: String, cancel: CancellationToken) {
        let schedule = match Cron::new(&cron).parse() {
            Ok(schedule) => schedule,
            Err(e) => {
                tracing::error!(cron = %cron, error = %e, "Invalid auto-download schedule, sweep disabled");
                return;
            }
        };
        tracing::info!(cron = %cron, "Auto-download sweep scheduled");

        loop {
            let next = match schedule.find_next_occurrence(&Utc::now(), false) {
                Ok(next) => next,
                Err(e) => {
                    tracing::error!(error = %e, "No next occurrence for schedule, sweep stopped");
                    return;
                }
            };
            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            tracing::debug!(next = %next, "Next auto-download sweep");

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Auto-download sweep stopping");
                    break;
                }
                _ = tokio::time::sleep(wait) => {
                    match self.run_once().await {
                        Some(Ok(summary)) => tracing::info!(?summary, "Auto-download sweep finished"),
                        Some(Err(e)) => tracing::error!(error = %e, "Auto-download sweep failed"),
                        None => {}
                    }
                }
            }
        }
    }
}
