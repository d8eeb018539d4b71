//! Signals: snapshots of external entities and parsing of their values.
//!
//! External sources report a free-text `state` plus a bag of JSON
//! `attributes`. The same field can arrive as a number, a clock time or a
//! full datetime, so values go through an explicit tagged parse step
//! ([`HourSignal`]) before any comparison logic runs.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::time::Timestamp;
use crate::window::TimeOfDay;

/// Point-in-time view of an external entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalState {
    pub state: String,
    #[serde(default)]
    pub attributes: serde_json::Value,
    #[serde(default)]
    pub last_updated: Option<Timestamp>,
}

impl SignalState {
    /// A state with no attributes.
    #[must_use]
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            attributes: serde_json::Value::Null,
            last_updated: None,
        }
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: serde_json::Value) -> Self {
        self.attributes = attributes;
        self
    }

    /// Whether the state reads `on` (case-insensitive).
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.state.trim().eq_ignore_ascii_case("on")
    }

    /// Whether the source reported a placeholder instead of a value.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        is_placeholder(&self.state)
    }

    /// Look up a single attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }
}

/// A state transition reported by an external entity (door sensor, power
/// switch, …).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChanged {
    pub entity_id: String,
    pub old_state: Option<String>,
    pub new_state: Option<String>,
    pub at: Timestamp,
}

fn is_placeholder(state: &str) -> bool {
    let state = state.trim();
    state.is_empty()
        || state.eq_ignore_ascii_case("unknown")
        || state.eq_ignore_ascii_case("unavailable")
}

/// Device readiness: the status text contains `ready_substring`,
/// compared case-insensitively. Missing, empty, `unknown` and
/// `unavailable` statuses are never ready.
#[must_use]
pub fn is_ready(status: Option<&str>, ready_substring: &str) -> bool {
    let Some(status) = status else {
        return false;
    };
    if is_placeholder(status) {
        return false;
    }
    status
        .to_lowercase()
        .contains(&ready_substring.to_lowercase())
}

/// Canonical forms accepted for the "cheapest hour" signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HourSignal {
    /// `"14"`, `"14.0"`, `"13.7"` (truncated).
    Numeric(f64),
    /// `"14:00"`, `"14:00:00"`.
    Clock(TimeOfDay),
    /// ISO datetime carrying an offset, converted to local time before use.
    Instant(DateTime<FixedOffset>),
    /// ISO datetime without offset, already in local time.
    Local(NaiveDateTime),
}

impl HourSignal {
    /// Parse with the fallback order numeric → time of day → datetime.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::UnparsableValue`] when no form matches.
    pub fn parse(raw: &str) -> Result<Self, PlanError> {
        let trimmed = raw.trim();
        if let Ok(value) = trimmed.parse::<f64>() {
            if value.is_finite() {
                return Ok(Self::Numeric(value));
            }
        }
        if let Some(clock) = TimeOfDay::parse_clock(trimmed) {
            return Ok(Self::Clock(clock));
        }
        if let Some(instant) = parse_instant(trimmed) {
            return Ok(Self::Instant(instant));
        }
        if let Some(local) = parse_local_datetime(trimmed) {
            return Ok(Self::Local(local));
        }
        Err(PlanError::UnparsableValue {
            what: "hour",
            value: raw.to_string(),
        })
    }

    /// Resolve to an hour of day in `tz`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::OutOfRange`] for numeric values outside `0..=23`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn hour<Tz: TimeZone>(self, tz: &Tz) -> Result<u32, PlanError> {
        match self {
            Self::Numeric(value) => {
                let hour = value.trunc() as i64;
                u32::try_from(hour)
                    .ok()
                    .filter(|h| *h <= 23)
                    .ok_or(PlanError::OutOfRange(hour))
            }
            Self::Clock(clock) => Ok(clock.hour()),
            Self::Instant(instant) => Ok(instant.with_timezone(tz).hour()),
            Self::Local(local) => Ok(local.hour()),
        }
    }
}

/// Parse the cheapest-hour signal into an hour of day.
///
/// # Errors
///
/// Returns [`PlanError::UnparsableValue`] or [`PlanError::OutOfRange`].
pub fn parse_cheapest_hour<Tz: TimeZone>(raw: &str, tz: &Tz) -> Result<u32, PlanError> {
    HourSignal::parse(raw)?.hour(tz)
}

pub(crate) fn parse_instant(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z"))
        .ok()
}

pub(crate) fn parse_local_datetime(raw: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Parse a timestamp that may or may not carry an offset; offset-less
/// values are read as local time in `tz`.
pub(crate) fn parse_timestamp<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<Timestamp> {
    let raw = raw.trim();
    if let Some(instant) = parse_instant(raw) {
        return Some(instant.to_utc());
    }
    parse_local_datetime(raw)
        .and_then(|local| tz.from_local_datetime(&local).earliest())
        .map(|dt| dt.to_utc())
}
