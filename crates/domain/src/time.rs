//! Time and timestamp helpers.

use chrono::{DateTime, Duration, DurationRound, Utc};

/// UTC timestamp used for planned starts, attempts and price slots.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Drop seconds and sub-seconds.
#[must_use]
pub fn truncate_to_minute(ts: Timestamp) -> Timestamp {
    ts.duration_trunc(Duration::minutes(1)).unwrap_or(ts)
}

/// Whether two instants fall on the same wall-clock minute.
#[must_use]
pub fn same_minute(a: Timestamp, b: Timestamp) -> bool {
    truncate_to_minute(a) == truncate_to_minute(b)
}

/// The next minute boundary strictly after `ts`.
#[must_use]
pub fn next_minute(ts: Timestamp) -> Timestamp {
    truncate_to_minute(ts) + Duration::minutes(1)
}
