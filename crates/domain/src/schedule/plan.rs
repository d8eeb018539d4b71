//! Planning mode and planned runs.

use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::time::Timestamp;

/// How the next start is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlanningMode {
    /// At the hour reported by the cheapest-hour signal, within the next 24 hours.
    #[default]
    #[serde(rename = "cheapest_24h")]
    CheapestIn24h,
    /// As soon as possible, ignoring the allowed window.
    #[serde(rename = "start_now")]
    StartNow,
}

impl PlanningMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CheapestIn24h => "cheapest_24h",
            Self::StartNow => "start_now",
        }
    }
}

impl std::fmt::Display for PlanningMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanningMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cheapest_24h" => Ok(Self::CheapestIn24h),
            "start_now" => Ok(Self::StartNow),
            other => Err(ValidationError::UnknownPlanningMode(other.to_string())),
        }
    }
}

/// Which algorithm produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    CheapestHour,
    PriceWindow,
    /// Start-now plans; never checked against the allowed window.
    Immediate,
}

/// A planned run. The end is always derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub start: Timestamp,
    pub duration_minutes: u32,
    pub source: PlanSource,
}

impl Plan {
    #[must_use]
    pub fn new(start: Timestamp, duration_minutes: u32, source: PlanSource) -> Self {
        Self {
            start,
            duration_minutes,
            source,
        }
    }

    #[must_use]
    pub fn end(&self) -> Timestamp {
        self.start + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Whether the allowed window applies to this plan.
    #[must_use]
    pub fn is_window_bound(&self) -> bool {
        self.source != PlanSource::Immediate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn should_derive_end_from_start_and_duration() {
        let start = Utc.with_ymd_and_hms(2025, 1, 10, 23, 30, 0).unwrap();
        let plan = Plan::new(start, 90, PlanSource::CheapestHour);
        assert_eq!(
            plan.end(),
            Utc.with_ymd_and_hms(2025, 1, 11, 1, 0, 0).unwrap()
        );
    }

    #[test]
    fn should_serialize_planning_mode_with_short_names() {
        assert_eq!(
            serde_json::to_string(&PlanningMode::CheapestIn24h).unwrap(),
            "\"cheapest_24h\""
        );
        assert_eq!(
            serde_json::to_string(&PlanningMode::StartNow).unwrap(),
            "\"start_now\""
        );
    }

    #[test]
    fn should_parse_planning_mode_from_str() {
        assert_eq!("start_now".parse(), Ok(PlanningMode::StartNow));
        assert_eq!(
            "later".parse::<PlanningMode>(),
            Err(ValidationError::UnknownPlanningMode("later".to_string()))
        );
    }

    #[test]
    fn should_exempt_immediate_plans_from_window() {
        let start = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
        assert!(!Plan::new(start, 60, PlanSource::Immediate).is_window_bound());
        assert!(Plan::new(start, 60, PlanSource::PriceWindow).is_window_bound());
    }
}
