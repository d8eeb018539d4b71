//! Runtime state of one scheduler.

use serde::{Deserialize, Serialize};

use super::plan::Plan;
use crate::time::Timestamp;

/// Outcome of the most recent attempt (or reset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunResult {
    #[default]
    Never,
    NotReady,
    Started,
    StartFailed,
    OutsideWindow,
    ResetOnDoorOpen,
}

impl RunResult {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::NotReady => "not_ready",
            Self::Started => "started",
            Self::StartFailed => "start_failed",
            Self::OutsideWindow => "outside_window",
            Self::ResetOnDoorOpen => "reset_on_door_open",
        }
    }
}

impl std::fmt::Display for RunResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse lifecycle derived from [`RuntimeState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    ArmedPending,
    Fired,
}

/// The engine's only mutable data. Created empty, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeState {
    pub armed: bool,
    pub plan: Option<Plan>,
    pub last_attempt: Option<Timestamp>,
    pub last_result: RunResult,
    pub started_at: Option<Timestamp>,
}

impl RuntimeState {
    #[must_use]
    pub fn planned_start(&self) -> Option<Timestamp> {
        self.plan.map(|plan| plan.start)
    }

    #[must_use]
    pub fn planned_end(&self) -> Option<Timestamp> {
        self.plan.map(|plan| plan.end())
    }

    /// Duration of the current plan, `0` when there is none.
    #[must_use]
    pub fn planned_duration_minutes(&self) -> u32 {
        self.plan.map_or(0, |plan| plan.duration_minutes)
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        if self.started_at.is_some() {
            Phase::Fired
        } else if self.armed {
            Phase::ArmedPending
        } else {
            Phase::Idle
        }
    }

    pub fn set_plan(&mut self, plan: Plan) {
        self.plan = Some(plan);
    }

    pub fn clear_plan(&mut self) {
        self.plan = None;
    }

    /// Record one attempt at `at` with its outcome.
    pub fn record_attempt(&mut self, at: Timestamp, result: RunResult) {
        self.last_attempt = Some(at);
        self.last_result = result;
    }

    /// The start action succeeded: disarm and remember when.
    pub fn mark_started(&mut self, at: Timestamp) {
        self.armed = false;
        self.started_at = Some(at);
    }

    /// The cycle is considered over: drop everything but the attempt time.
    pub fn reset_on_door_open(&mut self) {
        self.armed = false;
        self.plan = None;
        self.started_at = None;
        self.last_result = RunResult::ResetOnDoorOpen;
    }
}
