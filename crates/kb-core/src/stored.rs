//! Persisted `blockedItems` format.
//!
//! The settings UI writes each item either as a bare keyword string or as a
//! `{ keyword, expiration }` object. Loading accepts both shapes, drops
//! anything else, and removes case-insensitive duplicates (first one wins).
//! Writing uses the bare string whenever there is no expiration.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{position_of_keyword, BlockEntry, Timestamp};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum StoredItem {
    Bare(String),
    Detailed {
        keyword: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expiration: Option<serde_json::Number>,
    },
}

impl From<&BlockEntry> for StoredItem {
    fn from(entry: &BlockEntry) -> Self {
        match entry.expiration {
            None => StoredItem::Bare(entry.keyword.clone()),
            Some(expiration) => StoredItem::Detailed {
                keyword: entry.keyword.clone(),
                expiration: Some(expiration.into()),
            },
        }
    }
}

/// Result of normalizing a persisted value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub entries: Vec<BlockEntry>,
    /// Items that were malformed, empty or duplicated
    pub dropped: usize,
}

/// Normalize a persisted `blockedItems` value into entries.
///
/// A missing value (`null`) yields an empty list. A value that is not an
/// array is treated as entirely malformed.
pub fn normalize_items(value: &Value) -> Normalized {
    let items = match value {
        Value::Null => return Normalized::default(),
        Value::Array(items) => items,
        other => {
            log::warn!("Ignoring malformed blocked items value: {}", other);
            return Normalized { entries: Vec::new(), dropped: 1 };
        }
    };

    let mut entries: Vec<BlockEntry> = Vec::with_capacity(items.len());
    let mut dropped = 0usize;

    for item in items {
        let entry = match serde_json::from_value::<StoredItem>(item.clone()) {
            Ok(StoredItem::Bare(keyword)) => BlockEntry::new(&keyword, None).ok(),
            Ok(StoredItem::Detailed { keyword, expiration }) => {
                BlockEntry::new(&keyword, expiration.as_ref().and_then(number_to_timestamp)).ok()
            }
            Err(_) => None,
        };

        let Some(entry) = entry else {
            log::warn!("Dropping malformed blocked item: {}", item);
            dropped += 1;
            continue;
        };

        if position_of_keyword(&entries, &entry.keyword, None).is_some() {
            log::warn!("Dropping duplicate blocked item: {}", entry.keyword);
            dropped += 1;
            continue;
        }

        entries.push(entry);
    }

    Normalized { entries, dropped }
}

/// Serialize entries into the persisted shape.
pub fn to_stored_value(entries: &[BlockEntry]) -> Value {
    let items: Vec<StoredItem> = entries.iter().map(StoredItem::from).collect();
    // Serializing strings and integers cannot fail.
    serde_json::to_value(items).unwrap_or(Value::Array(Vec::new()))
}

fn number_to_timestamp(number: &serde_json::Number) -> Option<Timestamp> {
    number
        .as_i64()
        .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f as Timestamp))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn accepts_both_shapes_and_drops_garbage() {
        let value = json!(["a", {"keyword": "b", "expiration": 5}, 7, "", {"keyword": "c", "expiration": null}]);
        let normalized = normalize_items(&value);

        assert_eq!(
            normalized.entries,
            vec![
                BlockEntry::new("a", None).unwrap(),
                BlockEntry::new("b", Some(5)).unwrap(),
                BlockEntry::new("c", None).unwrap(),
            ]
        );
        assert_eq!(normalized.dropped, 2);
    }

    #[test]
    fn first_duplicate_wins() {
        let value = json!(["Fegz", {"keyword": "fegz", "expiration": 10}]);
        let normalized = normalize_items(&value);
        assert_eq!(normalized.entries, vec![BlockEntry::new("Fegz", None).unwrap()]);
        assert_eq!(normalized.dropped, 1);
    }

    #[test]
    fn float_expirations_are_truncated() {
        let value = json!([{"keyword": "x", "expiration": 1700000000000.0}]);
        let normalized = normalize_items(&value);
        assert_eq!(normalized.entries[0].expiration, Some(1_700_000_000_000));
    }

    #[test]
    fn missing_and_non_array_values() {
        assert_eq!(normalize_items(&Value::Null), Normalized::default());
        let normalized = normalize_items(&json!({"keyword": "x"}));
        assert!(normalized.entries.is_empty());
        assert_eq!(normalized.dropped, 1);
    }

    #[test]
    fn writes_bare_strings_without_expiration() {
        let entries = vec![
            BlockEntry::new("plain", None).unwrap(),
            BlockEntry::new("timed", Some(42)).unwrap(),
        ];
        assert_eq!(
            to_stored_value(&entries),
            json!(["plain", {"keyword": "timed", "expiration": 42}])
        );
    }
}
