//! Core type definitions for KeywordBlocker
//!
//! A `BlockEntry` is the only record the blocker keeps. Storage may hold the
//! legacy bare-string shape, but that is normalized away in `stored` so every
//! other module sees exactly this type.

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch, as produced by `Date.now()`.
pub type Timestamp = i64;

/// Errors raised while constructing or validating an entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryError {
    #[error("Keyword must not be empty")]
    EmptyKeyword,
    #[error("Expiration {expiration} is earlier than the minimum {earliest}")]
    ExpirationTooSoon { expiration: Timestamp, earliest: Timestamp },
}

// =============================================================================
// Block Entry
// =============================================================================

/// One keyword the blocker matches against, with an optional expiration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockEntry {
    /// Keyword as the user entered it (trimmed, case preserved)
    pub keyword: String,
    /// Expiration time; `None` means the entry never expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<Timestamp>,
}

impl BlockEntry {
    /// Build an entry, trimming the keyword and rejecting empty ones.
    pub fn new(keyword: &str, expiration: Option<Timestamp>) -> Result<Self, EntryError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(EntryError::EmptyKeyword);
        }
        Ok(Self {
            keyword: keyword.to_string(),
            expiration,
        })
    }

    /// Entry without expiration.
    pub fn permanent(keyword: &str) -> Result<Self, EntryError> {
        Self::new(keyword, None)
    }

    /// An entry is expired once `now` reaches its expiration.
    #[inline]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        matches!(self.expiration, Some(expiration) if expiration <= now)
    }

    #[inline]
    pub fn is_active(&self, now: Timestamp) -> bool {
        !self.is_expired(now)
    }

    /// Lowercased keyword, the form used for matching and rule filters.
    pub fn normalized_keyword(&self) -> String {
        self.keyword.to_lowercase()
    }

    /// Case-insensitive keyword equality.
    pub fn same_keyword(&self, keyword: &str) -> bool {
        keyword_eq(&self.keyword, keyword)
    }
}

/// Case-insensitive keyword comparison used for duplicate detection.
pub fn keyword_eq(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Position of the entry whose keyword equals `keyword`, ignoring `skip`.
pub fn position_of_keyword(entries: &[BlockEntry], keyword: &str, skip: Option<usize>) -> Option<usize> {
    entries
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != skip)
        .find(|(_, entry)| entry.same_keyword(keyword))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_rejects_empty_keywords() {
        let entry = BlockEntry::new("  fegz ", None).unwrap();
        assert_eq!(entry.keyword, "fegz");
        assert_eq!(BlockEntry::new("   ", None), Err(EntryError::EmptyKeyword));
    }

    #[test]
    fn expiration_boundary_is_inclusive() {
        let entry = BlockEntry::new("test", Some(1_000)).unwrap();
        assert!(entry.is_active(999));
        assert!(entry.is_expired(1_000));
        assert!(entry.is_expired(1_001));
        assert!(BlockEntry::permanent("test").unwrap().is_active(i64::MAX));
    }

    #[test]
    fn keyword_comparison_ignores_case() {
        let entries = vec![
            BlockEntry::permanent("Example.com").unwrap(),
            BlockEntry::permanent("other").unwrap(),
        ];
        assert_eq!(position_of_keyword(&entries, "EXAMPLE.COM", None), Some(0));
        assert_eq!(position_of_keyword(&entries, "example.com", Some(0)), None);
        assert_eq!(position_of_keyword(&entries, "missing", None), None);
    }
}
