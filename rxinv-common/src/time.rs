//! Timestamp utilities

use chrono::{DateTime, Duration, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Cutoff instant for "older than `minutes`" filters
///
/// Negative values are treated as zero.
pub fn minutes_before(reference: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    reference - Duration::minutes(minutes.max(0))
}
