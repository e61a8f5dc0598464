//! Consumer for upstream set-update pushes.

use async_trait::async_trait;
use aura_db::repositories::SubscriptionRepo;
use aura_db::DbPool;
use aura_mediux::processor::SetUpdateHandler;
use aura_pipeline::{ChangeDetector, ItemResult};

/// Runs a forced change check for every item subscribed to an updated set.
pub struct SetUpdateConsumer {
    db: DbPool,
    detector: ChangeDetector,
}

impl SetUpdateConsumer {
    pub fn new(db: DbPool, detector: ChangeDetector) -> Self {
        Self { db, detector }
    }

    /// Check every item subscribed to `set_id`, one after another.
    pub async fn handle_set(&self, set_id: &str) -> Vec<ItemResult> {
        let records = match SubscriptionRepo::list_by_poster_set(&self.db, set_id).await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(set_id, error = %e, "Failed to look up subscribers");
                return Vec::new();
            }
        };
        if records.is_empty() {
            tracing::debug!(set_id, "No subscriptions for updated set");
            return Vec::new();
        }

        let mut results = Vec::with_capacity(records.len());
        for record in records.iter().filter(|r| !r.ignored) {
            results.push(self.detector.check_item(record, true).await);
        }
        results
    }
}

#[async_trait]
impl SetUpdateHandler for SetUpdateConsumer {
    async fn on_sets_updated(&self, set_ids: &[String]) {
        for set_id in set_ids {
            let results = self.handle_set(set_id).await;
            if !results.is_empty() {
                tracing::info!(set_id = %set_id, items = results.len(), "Processed set update");
            }
        }
    }
}
