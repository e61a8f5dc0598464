//! Timestamp helpers for `LastDownloaded` bookkeeping and cache keys.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::types::Timestamp;

/// Format used by upstream image cache-busters and cache file names.
pub const CACHE_BUSTER_FORMAT: &str = "%Y%m%d%H%M%S";

/// Parse an RFC-3339 string into a UTC timestamp.
pub fn parse_rfc3339(value: &str) -> Option<Timestamp> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Render a timestamp the way it is stored in `LastDownloaded`.
pub fn format_rfc3339(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn now_rfc3339() -> String {
    format_rfc3339(&Utc::now())
}

/// Whether `last_downloaded` is strictly before `latest`.
///
/// An unparseable `last_downloaded` is never older, so corrupted state cannot
/// trigger a redownload of everything.
pub fn is_older(last_downloaded: &str, latest: &Timestamp) -> bool {
    match parse_rfc3339(last_downloaded) {
        Some(last) => last < *latest,
        None => false,
    }
}

/// `YYYYMMDDHHMMSS` rendering of a timestamp.
pub fn cache_buster(ts: &Timestamp) -> String {
    ts.format(CACHE_BUSTER_FORMAT).to_string()
}

/// New `LastDownloaded` after an apply: the later of `now` and the applied
/// file's modification time.
///
/// Sub-second precision is kept so the stored value never sorts before a
/// fractional `Modified`.
pub fn bump_last_downloaded(now: &Timestamp, applied_modified: &Timestamp) -> String {
    std::cmp::max(now, applied_modified).to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
