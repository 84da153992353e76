//! Block list edits.
//!
//! Each function returns the next list and leaves the input alone, so a
//! caller can persist the result before adopting it. `KeywordStore` and the
//! wasm bindings share these checks.

use kb_core::types::position_of_keyword;
use kb_core::{validate_expiration, BlockEntry, Timestamp};

use crate::error::BlockerError;

/// Reject a timed entry that expires less than `min_lead_ms` from `now`.
pub fn check_expiration(expiration: Option<Timestamp>, now: Timestamp, min_lead_ms: i64) -> Result<(), BlockerError> {
    if let Some(expiration) = expiration {
        validate_expiration(expiration, now, min_lead_ms)?;
    }
    Ok(())
}

/// Append a keyword unless an equal one (ignoring case) exists.
pub fn added(entries: &[BlockEntry], keyword: &str, expiration: Option<Timestamp>) -> Result<Vec<BlockEntry>, BlockerError> {
    let entry = BlockEntry::new(keyword, expiration)?;
    if position_of_keyword(entries, &entry.keyword, None).is_some() {
        return Err(BlockerError::DuplicateKeyword(entry.keyword));
    }

    let mut next = entries.to_vec();
    next.push(entry);
    Ok(next)
}

/// Replace the entry at `index`. Only a different entry can collide.
pub fn updated(
    entries: &[BlockEntry],
    index: usize,
    keyword: &str,
    expiration: Option<Timestamp>,
) -> Result<Vec<BlockEntry>, BlockerError> {
    check_index(entries, index)?;
    let entry = BlockEntry::new(keyword, expiration)?;
    if position_of_keyword(entries, &entry.keyword, Some(index)).is_some() {
        return Err(BlockerError::DuplicateKeyword(entry.keyword));
    }

    let mut next = entries.to_vec();
    next[index] = entry;
    Ok(next)
}

/// Remove the entry at `index`, returning the next list and the removed entry.
pub fn removed(entries: &[BlockEntry], index: usize) -> Result<(Vec<BlockEntry>, BlockEntry), BlockerError> {
    check_index(entries, index)?;
    let mut next = entries.to_vec();
    let entry = next.remove(index);
    Ok((next, entry))
}

fn check_index(entries: &[BlockEntry], index: usize) -> Result<(), BlockerError> {
    if index >= entries.len() {
        log::error!("Blocked item index {} out of range ({})", index, entries.len());
        return Err(BlockerError::IndexOutOfRange {
            index,
            len: entries.len(),
        });
    }
    Ok(())
}
