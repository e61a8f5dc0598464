//! Manual download queue.
//!
//! Each `*.json` file in the queue directory holds one item with its
//! subscriptions. Files are processed one at a time: deleted on success,
//! renamed to `warning_*` on partial success and to `error_*` on failure.

use std::path::{Path, PathBuf};
use std::time::Duration;

use aura_core::subscription::MediaItemWithSubs;
use aura_pipeline::{ChangeDetector, OverallResult};
use tokio_util::sync::CancellationToken;

/// How often the directory is scanned.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

pub const ERROR_PREFIX: &str = "error_";
pub const WARNING_PREFIX: &str = "warning_";

/// What happened to one queue file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    /// Everything applied; the file was removed.
    Completed,
    /// Some subscriptions failed; the file was renamed to `warning_*`.
    Partial,
    /// Nothing applied or the file was unreadable; renamed to `error_*`.
    Failed,
}

/// Queue files waiting to be processed, oldest name first.
pub async fn pending_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with(ERROR_PREFIX) || name.starts_with(WARNING_PREFIX) {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Process one queue file and move it according to the outcome.
pub async fn process_file(detector: &ChangeDetector, path: &Path) -> std::io::Result<QueueOutcome> {
    let outcome = match read_entry(path).await {
        Ok(record) => {
            let result = detector.apply_unconditionally(&record).await;
            tracing::info!(
                file = %path.display(),
                title = %result.title,
                overall = ?result.overall,
                message = %result.message,
                "Queue entry processed"
            );
            match result.overall {
                OverallResult::Error => QueueOutcome::Failed,
                OverallResult::Warn => QueueOutcome::Partial,
                OverallResult::Success | OverallResult::Skipped | OverallResult::Redownloaded => {
                    QueueOutcome::Completed
                }
            }
        }
        Err(e) => {
            tracing::error!(file = %path.display(), error = %e, "Unreadable queue entry");
            QueueOutcome::Failed
        }
    };

    match outcome {
        QueueOutcome::Completed => tokio::fs::remove_file(path).await?,
        QueueOutcome::Partial => rename_with_prefix(path, WARNING_PREFIX).await?,
        QueueOutcome::Failed => rename_with_prefix(path, ERROR_PREFIX).await?,
    }
    Ok(outcome)
}

async fn read_entry(path: &Path) -> anyhow::Result<MediaItemWithSubs> {
    let text = tokio::fs::read_to_string(path).await?;
    let record: MediaItemWithSubs = serde_json::from_str(&text)?;
    record.validate()?;
    Ok(record)
}

async fn rename_with_prefix(path: &Path, prefix: &str) -> std::io::Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    tokio::fs::rename(path, path.with_file_name(format!("{prefix}{name}"))).await
}

/// Process every pending file once.
pub async fn drain(detector: &ChangeDetector, dir: &Path) -> std::io::Result<Vec<(PathBuf, QueueOutcome)>> {
    let mut processed = Vec::new();
    for path in pending_files(dir).await? {
        match process_file(detector, &path).await {
            Ok(outcome) => processed.push((path, outcome)),
            Err(e) => tracing::error!(file = %path.display(), error = %e, "Failed to move queue entry"),
        }
    }
    Ok(processed)
}

/// Poll `dir` until `cancel` fires.
pub async fn run(detector: ChangeDetector, dir: PathBuf, cancel: CancellationToken) {
    tracing::info!(dir = %dir.display(), interval_secs = POLL_INTERVAL.as_secs(), "Download queue started");
    let mut interval = tokio::time::interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Download queue stopping");
                break;
            }
            _ = interval.tick() => {
                match drain(&detector, &dir).await {
                    Ok(processed) if !processed.is_empty() => {
                        tracing::info!(files = processed.len(), "Download queue drained");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(dir = %dir.display(), error = %e, "Failed to scan download queue"),
                }
            }
        }
    }
}
