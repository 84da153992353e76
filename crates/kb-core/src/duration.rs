//! Expiration validation and human-readable durations.

use crate::types::{EntryError, Timestamp};

/// Expirations must lie at least this far in the future (10 minutes).
pub const MIN_EXPIRATION_LEAD_MS: i64 = 10 * 60 * 1000;

const SECOND_MS: i64 = 1000;

/// Reject expirations closer than `min_lead_ms` to `now`.
pub fn validate_expiration(expiration: Timestamp, now: Timestamp, min_lead_ms: i64) -> Result<(), EntryError> {
    let earliest = now.saturating_add(min_lead_ms);
    if expiration < earliest {
        return Err(EntryError::ExpirationTooSoon { expiration, earliest });
    }
    Ok(())
}

/// Format the span between two instants as "1 day", "3 hours", etc.
///
/// Months are 30 days and years 365 days; only the largest unit is shown.
pub fn format_duration(from: Timestamp, to: Timestamp) -> String {
    let diff = to.saturating_sub(from);
    if diff <= 0 {
        return "expired".to_string();
    }

    let seconds = diff / SECOND_MS;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;
    let months = days / 30;
    let years = days / 365;

    let (count, unit) = if years > 0 {
        (years, "year")
    } else if months > 0 {
        (months, "month")
    } else if days > 0 {
        (days, "day")
    } else if hours > 0 {
        (hours, "hour")
    } else if minutes > 0 {
        (minutes, "minute")
    } else {
        (seconds, "second")
    };

    if count == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", count, unit)
    }
}
