//! Expiration sweeping.
//!
//! `sweep` is pure: it partitions entries into survivors and expired ones.
//! Persisting the survivors and recompiling rules is the caller's concern.

use crate::types::{BlockEntry, Timestamp};

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepResult {
    /// Entries without expiration or expiring after `now`, in original order
    pub survivors: Vec<BlockEntry>,
    /// Entries whose expiration is at or before `now`
    pub removed: Vec<BlockEntry>,
}

impl SweepResult {
    #[inline]
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }

    #[inline]
    pub fn changed(&self) -> bool {
        !self.removed.is_empty()
    }
}

/// Split `entries` into survivors and expired entries.
pub fn sweep(entries: &[BlockEntry], now: Timestamp) -> SweepResult {
    let (survivors, removed): (Vec<BlockEntry>, Vec<BlockEntry>) =
        entries.iter().cloned().partition(|entry| entry.is_active(now));

    for entry in &removed {
        log::info!("Blocked item expired: {}", entry.keyword);
    }

    SweepResult { survivors, removed }
}
