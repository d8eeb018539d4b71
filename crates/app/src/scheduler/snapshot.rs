//! Serialisable view of a scheduler, handed to listeners and the API.

use serde::{Deserialize, Serialize};

use offpeak_domain::options::SchedulerOptions;
use offpeak_domain::schedule::{Phase, PlanSource, RunResult, RuntimeState};
use offpeak_domain::time::Timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    pub name: String,
    pub phase: Phase,
    pub armed: bool,
    pub planned_start: Option<Timestamp>,
    pub planned_end: Option<Timestamp>,
    pub planned_duration_minutes: u32,
    pub plan_source: Option<PlanSource>,
    pub last_attempt: Option<Timestamp>,
    pub last_result: RunResult,
    pub started_at: Option<Timestamp>,
    pub options: SchedulerOptions,
}

impl SchedulerSnapshot {
    #[must_use]
    pub fn new(name: &str, state: &RuntimeState, options: &SchedulerOptions) -> Self {
        Self {
            name: name.to_string(),
            phase: state.phase(),
            armed: state.armed,
            planned_start: state.planned_start(),
            planned_end: state.planned_end(),
            planned_duration_minutes: state.planned_duration_minutes(),
            plan_source: state.plan.map(|plan| plan.source),
            last_attempt: state.last_attempt,
            last_result: state.last_result,
            started_at: state.started_at,
            options: options.clone(),
        }
    }
}
