//! Allowed window: the time-of-day span during which a run may happen.
//!
//! A window is a pair of [`TimeOfDay`] bounds. Equal bounds mean "no
//! restriction"; a start later than the end wraps past midnight
//! (e.g. `22:00-06:00`).

use std::fmt;

use chrono::{NaiveTime, TimeZone, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::time::Timestamp;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// A wall-clock time with minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub const MIDNIGHT: Self = Self { hour: 0, minute: 0 };

    /// Build from components, `None` when out of range.
    #[must_use]
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self {
                hour: u8::try_from(hour).ok()?,
                minute: u8::try_from(minute).ok()?,
            })
        } else {
            None
        }
    }

    /// Map a bare hour to `hour:00`, wrapping into `0..24`.
    #[must_use]
    pub fn from_hour(hour: i64) -> Self {
        let hour = u8::try_from(hour.rem_euclid(24)).unwrap_or(0);
        Self { hour, minute: 0 }
    }

    /// Parse `HH:MM` / `HH:MM:SS` only.
    #[must_use]
    pub fn parse_clock(input: &str) -> Option<Self> {
        let input = input.trim();
        NaiveTime::parse_from_str(input, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(input, "%H:%M"))
            .ok()
            .and_then(|t| Self::new(t.hour(), t.minute()))
    }

    /// Parse a clock time or a bare (possibly fractional) hour.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        Self::parse_clock(input).or_else(|| {
            input
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(hour_from_float)
        })
    }

    /// Lenient parse used for stored and configured window bounds:
    /// anything unparsable becomes `00:00`.
    #[must_use]
    pub fn parse_or_midnight(input: &str) -> Self {
        Self::parse(input).unwrap_or(Self::MIDNIGHT)
    }

    #[must_use]
    pub fn hour(self) -> u32 {
        u32::from(self.hour)
    }

    #[must_use]
    pub fn minute(self) -> u32 {
        u32::from(self.minute)
    }

    /// Minutes elapsed since midnight.
    #[must_use]
    pub fn minute_of_day(self) -> u32 {
        self.hour() * 60 + self.minute()
    }

    /// Time of day of an instant, seen from `tz`.
    #[must_use]
    pub fn of_instant<Tz: TimeZone>(ts: Timestamp, tz: &Tz) -> Self {
        let local = ts.with_timezone(tz);
        Self {
            hour: u8::try_from(local.hour()).unwrap_or(0),
            minute: u8::try_from(local.minute()).unwrap_or(0),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn hour_from_float(value: f64) -> TimeOfDay {
    TimeOfDay::from_hour(value.trunc() as i64)
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Hour(i64),
            Fractional(f64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Hour(hour) => Self::from_hour(hour),
            Raw::Fractional(value) if value.is_finite() => hour_from_float(value),
            Raw::Fractional(_) => Self::MIDNIGHT,
            Raw::Text(text) => Self::parse_or_midnight(&text),
        })
    }
}

/// Hour-level membership test for a window given by its bound hours.
///
/// Equal bounds allow every hour; `start < end` is the half-open range
/// `start..end`; otherwise the range wraps past midnight.
#[must_use]
pub fn hour_in_window(hour: u32, start: u32, end: u32) -> bool {
    bounded_contains(hour, start, end)
}

fn bounded_contains(value: u32, start: u32, end: u32) -> bool {
    if start == end {
        return true;
    }
    if start < end {
        return start <= value && value < end;
    }
    value >= start || value < end
}

/// The configured span of the day during which a run is permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedWindow {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl AllowedWindow {
    #[must_use]
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }

    /// Equal bounds: every time is allowed.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.start == self.end
    }

    /// The window crosses midnight.
    #[must_use]
    pub fn wraps_midnight(&self) -> bool {
        self.start > self.end
    }

    /// Hour-level test against the bound hours (minutes of the bounds ignored).
    #[must_use]
    pub fn contains_hour(&self, hour: u32) -> bool {
        if self.is_unrestricted() {
            return true;
        }
        hour_in_window(hour, self.start.hour(), self.end.hour())
    }

    /// Minute-of-day test, half-open at the end bound.
    #[must_use]
    pub fn contains_minute(&self, minute_of_day: u32) -> bool {
        bounded_contains(
            minute_of_day % MINUTES_PER_DAY,
            self.start.minute_of_day(),
            self.end.minute_of_day(),
        )
    }

    /// Whether a run of `duration_minutes` starting at `start` lies entirely
    /// inside the window, evaluated in `tz`.
    ///
    /// - non-positive durations never fit
    /// - a non-wrapping window only accepts runs that start and finish on the
    ///   same calendar day, both ends inside `[start, end]`
    /// - a wrapping window accepts a late-evening start (at or after `start`)
    ///   finishing the next day at or before `end`, and an after-midnight
    ///   start (before `end`) finishing the same day at or before `end`
    #[must_use]
    pub fn contains_span<Tz: TimeZone>(
        &self,
        start: Timestamp,
        duration_minutes: i64,
        tz: &Tz,
    ) -> bool {
        if duration_minutes <= 0 {
            return false;
        }
        if self.is_unrestricted() {
            return true;
        }

        let end = start + chrono::Duration::minutes(duration_minutes);
        let local_start = start.with_timezone(tz);
        let local_end = end.with_timezone(tz);
        let day_shift = (local_end.date_naive() - local_start.date_naive()).num_days();

        let run_start = TimeOfDay::of_instant(start, tz).minute_of_day();
        let run_end = TimeOfDay::of_instant(end, tz).minute_of_day();
        let window_start = self.start.minute_of_day();
        let window_end = self.end.minute_of_day();

        if !self.wraps_midnight() {
            return day_shift == 0
                && (window_start..=window_end).contains(&run_start)
                && (window_start..=window_end).contains(&run_end);
        }

        if run_start >= window_start {
            return day_shift == 1 && run_end <= window_end;
        }
        if run_start < window_end {
            return day_shift == 0 && run_end <= window_end;
        }
        false
    }
}

impl Default for AllowedWindow {
    fn default() -> Self {
        Self {
            start: TimeOfDay::from_hour(21),
            end: TimeOfDay::from_hour(5),
        }
    }
}

impl fmt::Display for AllowedWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
