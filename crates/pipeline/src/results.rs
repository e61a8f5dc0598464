//! Per-item and per-subscription outcomes of a change check.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverallResult {
    Success,
    Warn,
    Error,
    Skipped,
    /// Movie re-applied after its rating key or file path changed.
    Redownloaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubscriptionOutcome {
    Success,
    Error,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionResult {
    pub poster_set_id: String,
    pub result: SubscriptionOutcome,
    pub reason: String,
    /// Files applied for this subscription, as short labels.
    pub applied: Vec<String>,
}

impl SubscriptionResult {
    pub fn skipped(poster_set_id: &str, reason: impl Into<String>) -> Self {
        Self {
            poster_set_id: poster_set_id.to_string(),
            result: SubscriptionOutcome::Skipped,
            reason: reason.into(),
            applied: Vec::new(),
        }
    }

    pub fn error(poster_set_id: &str, reason: impl Into<String>) -> Self {
        Self {
            poster_set_id: poster_set_id.to_string(),
            result: SubscriptionOutcome::Error,
            reason: reason.into(),
            applied: Vec::new(),
        }
    }

    pub fn success(poster_set_id: &str, reason: impl Into<String>, applied: Vec<String>) -> Self {
        Self {
            poster_set_id: poster_set_id.to_string(),
            result: SubscriptionOutcome::Success,
            reason: reason.into(),
            applied,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemResult {
    pub tmdb_id: String,
    pub library_title: String,
    pub title: String,
    pub overall: OverallResult,
    pub message: String,
    pub subscriptions: Vec<SubscriptionResult>,
}

impl ItemResult {
    /// Item-level failure before any subscription was looked at.
    pub fn failed(tmdb_id: &str, library_title: &str, title: &str, message: impl Into<String>) -> Self {
        Self {
            tmdb_id: tmdb_id.to_string(),
            library_title: library_title.to_string(),
            title: title.to_string(),
            overall: OverallResult::Error,
            message: message.into(),
            subscriptions: Vec::new(),
        }
    }

    pub fn error_count(&self) -> usize {
        self.count(SubscriptionOutcome::Error)
    }

    pub fn success_count(&self) -> usize {
        self.count(SubscriptionOutcome::Success)
    }

    fn count(&self, outcome: SubscriptionOutcome) -> usize {
        self.subscriptions
            .iter()
            .filter(|s| s.result == outcome)
            .count()
    }
}

/// Combine subscription outcomes into the item verdict.
///
/// All errors is `Error`; errors next to successes or skips is `Warn`; any
/// success otherwise is `Success`; nothing done is `Skipped`.
pub fn roll_up(subscriptions: &[SubscriptionResult]) -> (OverallResult, String) {
    let total = subscriptions.len();
    let errors = subscriptions
        .iter()
        .filter(|s| s.result == SubscriptionOutcome::Error)
        .count();
    let successes = subscriptions
        .iter()
        .filter(|s| s.result == SubscriptionOutcome::Success)
        .count();

    if total > 0 && errors == total {
        return (OverallResult::Error, "All set downloads failed".to_string());
    }
    if errors > 0 {
        return (
            OverallResult::Warn,
            format!("{successes} of {total} sets downloaded, {errors} failed"),
        );
    }
    if successes > 0 {
        return (
            OverallResult::Success,
            format!("{successes} of {total} sets downloaded"),
        );
    }
    let message = match subscriptions {
        [only] => only.reason.clone(),
        _ => "No sets needed downloading".to_string(),
    };
    (OverallResult::Skipped, message)
}
