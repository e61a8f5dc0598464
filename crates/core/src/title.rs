//! Title normalisation used when matching items by title and year.

use std::sync::LazyLock;

use regex::Regex;

/// Characters removed before titles are compared.
pub const COMPARISON_PUNCTUATION: &[char] = &[
    '-', '_', '.', ',', ':', ';', '!', '?', '\'', '(', ')', '[', ']', '{', '}',
];

static YEAR_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(\d{4}\)\s*$").expect("valid regex"));

/// Lowercase, drop [`COMPARISON_PUNCTUATION`] and collapse whitespace.
pub fn clean_string_for_comparison(input: &str) -> String {
    let stripped: String = input
        .to_lowercase()
        .chars()
        .filter(|c| !COMPARISON_PUNCTUATION.contains(c))
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove a trailing `(YYYY)` from a title.
pub fn strip_year_from_title(title: &str) -> String {
    YEAR_SUFFIX_RE.replace(title, "").trim().to_string()
}

/// Normalised form used for title lookups: year suffix stripped, then cleaned.
pub fn normalize_title(title: &str) -> String {
    clean_string_for_comparison(&strip_year_from_title(title))
}
