//! Small text helpers shared by stages and models.

/// Truncate a string to at most `max_chars` characters, respecting UTF-8
/// boundaries. Returns the input unchanged (cloned) when it already fits.
#[must_use]
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => s[..byte_idx].to_string(),
        None => s.to_string(),
    }
}

/// Whitespace-separated word count, used for `SourceSummary::word_count`.
#[must_use]
pub fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}
