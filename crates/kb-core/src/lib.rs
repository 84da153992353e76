//! KeywordBlocker Core Library
//!
//! This crate provides the pure building blocks of the KeywordBlocker content
//! blocker: the block-entry data model, keyword matching against URLs, titles
//! and page text, and expiration sweeping.
//!
//! Nothing in here touches the browser. Persistence, rule installation and tab
//! control live in `kb-background`, which feeds entries into these functions.
//!
//! # Modules
//!
//! - `types`: `BlockEntry` and timestamps
//! - `stored`: normalization of the persisted `blockedItems` value
//! - `url`: allocation-free URL slicing and context-menu keyword derivation
//! - `matcher`: case-insensitive substring matching honoring expiration
//! - `sweeper`: removal of expired entries
//! - `duration`: expiration validation and human-readable durations

pub mod duration;
pub mod matcher;
pub mod stored;
pub mod sweeper;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use duration::{format_duration, validate_expiration, MIN_EXPIRATION_LEAD_MS};
pub use matcher::{find_content_match, find_text_match, find_url_match, matches_content, matches_text, matches_url};
pub use stored::{normalize_items, to_stored_value, Normalized};
pub use sweeper::{sweep, SweepResult};
pub use types::{BlockEntry, EntryError, Timestamp};
