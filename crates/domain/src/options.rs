//! User-facing scheduler options and updates to them.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::schedule::PlanningMode;
use crate::window::{AllowedWindow, TimeOfDay};

pub const DEFAULT_READY_SUBSTRING: &str = "Ready";
pub const DEFAULT_DURATION_MINUTES: u32 = 120;

/// Options resolved for one scheduler. May change between evaluations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerOptions {
    pub ready_substring: String,
    pub window_start: TimeOfDay,
    pub window_end: TimeOfDay,
    pub planning_mode: PlanningMode,
    pub default_duration_minutes: u32,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        let window = AllowedWindow::default();
        Self {
            ready_substring: DEFAULT_READY_SUBSTRING.to_string(),
            window_start: window.start,
            window_end: window.end,
            planning_mode: PlanningMode::default(),
            default_duration_minutes: DEFAULT_DURATION_MINUTES,
        }
    }
}

impl SchedulerOptions {
    #[must_use]
    pub fn window(&self) -> AllowedWindow {
        AllowedWindow::new(self.window_start, self.window_end)
    }

    /// Validate and apply `update`.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] from [`OptionUpdate::validate`]; the
    /// options are left untouched in that case.
    pub fn apply(&mut self, update: &OptionUpdate) -> Result<(), ValidationError> {
        update.validate()?;
        match update {
            OptionUpdate::ReadySubstring(value) => self.ready_substring = value.trim().to_string(),
            OptionUpdate::WindowStart(value) => self.window_start = *value,
            OptionUpdate::WindowEnd(value) => self.window_end = *value,
            OptionUpdate::PlanningMode(value) => self.planning_mode = *value,
            OptionUpdate::DefaultDurationMinutes(value) => {
                self.default_duration_minutes =
                    u32::try_from(*value).map_err(|_| ValidationError::NonPositiveDuration)?;
            }
        }
        Ok(())
    }
}

/// A single option change, as `{"key": ..., "value": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "key", content = "value", rename_all = "snake_case")]
pub enum OptionUpdate {
    ReadySubstring(String),
    WindowStart(TimeOfDay),
    WindowEnd(TimeOfDay),
    PlanningMode(PlanningMode),
    DefaultDurationMinutes(i64),
}

impl OptionUpdate {
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::ReadySubstring(_) => "ready_substring",
            Self::WindowStart(_) => "window_start",
            Self::WindowEnd(_) => "window_end",
            Self::PlanningMode(_) => "planning_mode",
            Self::DefaultDurationMinutes(_) => "default_duration_minutes",
        }
    }

    /// The value half of the update, as it appears on the wire.
    #[must_use]
    pub fn value(&self) -> serde_json::Value {
        match self {
            Self::ReadySubstring(value) => serde_json::Value::from(value.as_str()),
            Self::WindowStart(value) | Self::WindowEnd(value) => {
                serde_json::Value::from(value.to_string())
            }
            Self::PlanningMode(value) => serde_json::Value::from(value.as_str()),
            Self::DefaultDurationMinutes(value) => serde_json::Value::from(*value),
        }
    }

    /// Rebuild an update from a stored key and value.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] for unknown keys or mistyped values.
    pub fn from_parts(key: &str, value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::json!({ "key": key, "value": value }))
    }

    /// # Errors
    ///
    /// - [`ValidationError::EmptyReadySubstring`] for blank substrings
    /// - [`ValidationError::NonPositiveDuration`] for durations outside `1..=u32::MAX`
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::ReadySubstring(value) if value.trim().is_empty() => {
                Err(ValidationError::EmptyReadySubstring)
            }
            Self::DefaultDurationMinutes(value)
                if *value <= 0 || u32::try_from(*value).is_err() =>
            {
                Err(ValidationError::NonPositiveDuration)
            }
            _ => Ok(()),
        }
    }

    /// Whether applying this update invalidates the current plan.
    #[must_use]
    pub fn affects_plan(&self) -> bool {
        !matches!(self, Self::ReadySubstring(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_evening_window_and_two_hours() {
        let options = SchedulerOptions::default();
        assert_eq!(options.ready_substring, "Ready");
        assert_eq!(options.window().to_string(), "21:00-05:00");
        assert_eq!(options.planning_mode, PlanningMode::CheapestIn24h);
        assert_eq!(options.default_duration_minutes, 120);
    }

    #[test]
    fn should_deserialize_tagged_update() {
        let update: OptionUpdate =
            serde_json::from_str(r#"{"key": "window_start", "value": "22:30"}"#).unwrap();
        assert_eq!(
            update,
            OptionUpdate::WindowStart(TimeOfDay::new(22, 30).unwrap())
        );

        let update: OptionUpdate =
            serde_json::from_str(r#"{"key": "planning_mode", "value": "start_now"}"#).unwrap();
        assert_eq!(update, OptionUpdate::PlanningMode(PlanningMode::StartNow));
    }

    #[test]
    fn should_accept_bare_hour_for_window_bound() {
        let update: OptionUpdate =
            serde_json::from_str(r#"{"key": "window_end", "value": 6}"#).unwrap();
        assert_eq!(update, OptionUpdate::WindowEnd(TimeOfDay::from_hour(6)));
    }

    #[test]
    fn should_reject_blank_ready_substring() {
        let mut options = SchedulerOptions::default();
        let err = options
            .apply(&OptionUpdate::ReadySubstring("  ".to_string()))
            .unwrap_err();
        assert_eq!(err, ValidationError::EmptyReadySubstring);
        assert_eq!(options.ready_substring, "Ready");
    }

    #[test]
    fn should_reject_non_positive_duration() {
        let mut options = SchedulerOptions::default();
        for value in [0, -30] {
            assert_eq!(
                options.apply(&OptionUpdate::DefaultDurationMinutes(value)),
                Err(ValidationError::NonPositiveDuration)
            );
        }
        assert_eq!(options.default_duration_minutes, 120);
    }

    #[test]
    fn should_apply_valid_updates() {
        let mut options = SchedulerOptions::default();
        options
            .apply(&OptionUpdate::DefaultDurationMinutes(150))
            .unwrap();
        options
            .apply(&OptionUpdate::ReadySubstring(" Waiting ".to_string()))
            .unwrap();
        assert_eq!(options.default_duration_minutes, 150);
        assert_eq!(options.ready_substring, "Waiting");
    }

    #[test]
    fn should_only_recompute_for_planning_inputs() {
        assert!(!OptionUpdate::ReadySubstring("x".to_string()).affects_plan());
        assert!(OptionUpdate::WindowEnd(TimeOfDay::MIDNIGHT).affects_plan());
        assert!(OptionUpdate::PlanningMode(PlanningMode::StartNow).affects_plan());
        assert!(OptionUpdate::DefaultDurationMinutes(60).affects_plan());
    }

    #[test]
    fn should_rebuild_update_from_stored_parts() {
        let original = OptionUpdate::WindowStart(TimeOfDay::new(23, 15).unwrap());
        let rebuilt = OptionUpdate::from_parts(original.key(), original.value()).unwrap();
        assert_eq!(rebuilt, original);
        assert!(OptionUpdate::from_parts("colour", serde_json::Value::Null).is_err());
    }
}
