//! Keyword Matching Engine
//!
//! Every navigation and every in-page scan goes through here. Matching is a
//! case-insensitive substring test of each active keyword against one or more
//! haystacks. Expired entries are skipped but never removed; that is the
//! sweeper's job.

use crate::types::{BlockEntry, Timestamp};

// =============================================================================
// Predicates
// =============================================================================

/// True iff an active keyword occurs in `url`.
#[inline]
pub fn matches_url(url: &str, entries: &[BlockEntry], now: Timestamp) -> bool {
    find_url_match(url, entries, now).is_some()
}

/// True iff an active keyword occurs in `url` or `title`.
#[inline]
pub fn matches_content(url: &str, title: &str, entries: &[BlockEntry], now: Timestamp) -> bool {
    find_content_match(url, title, entries, now).is_some()
}

/// True iff an active keyword occurs in the extracted page text or title.
///
/// The caller is responsible for not scanning the blocked-notice page itself.
#[inline]
pub fn matches_text(page_text: &str, page_title: &str, entries: &[BlockEntry], now: Timestamp) -> bool {
    find_text_match(page_text, page_title, entries, now).is_some()
}

// =============================================================================
// Diagnostic Variants
// =============================================================================

/// First active entry whose keyword occurs in `url`.
pub fn find_url_match<'e>(url: &str, entries: &'e [BlockEntry], now: Timestamp) -> Option<&'e BlockEntry> {
    find_match(&[url], entries, now)
}

/// First active entry whose keyword occurs in `url` or `title`.
pub fn find_content_match<'e>(
    url: &str,
    title: &str,
    entries: &'e [BlockEntry],
    now: Timestamp,
) -> Option<&'e BlockEntry> {
    find_match(&[url, title], entries, now)
}

/// First active entry whose keyword occurs in the page text or title.
pub fn find_text_match<'e>(
    page_text: &str,
    page_title: &str,
    entries: &'e [BlockEntry],
    now: Timestamp,
) -> Option<&'e BlockEntry> {
    find_match(&[page_text, page_title], entries, now)
}

fn find_match<'e>(haystacks: &[&str], entries: &'e [BlockEntry], now: Timestamp) -> Option<&'e BlockEntry> {
    if entries.is_empty() {
        return None;
    }

    let lowered: Vec<String> = haystacks
        .iter()
        .filter(|h| !h.is_empty())
        .map(|h| h.to_lowercase())
        .collect();
    if lowered.is_empty() {
        return None;
    }

    entries
        .iter()
        .filter(|entry| entry.is_active(now))
        .find(|entry| {
            let keyword = entry.normalized_keyword();
            // Empty keywords are rejected at construction; never let one match everything.
            !keyword.is_empty() && lowered.iter().any(|h| h.contains(keyword.as_str()))
        })
}
