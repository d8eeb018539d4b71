//! Scheduling engine: plans the next start and triggers it on time.
//!
//! One [`Scheduler`] manages one device. It is driven by four inputs:
//! arm/disarm commands, the per-minute tick, door sensor transitions and
//! explicit price-based scheduling requests. None of them return errors;
//! every failure ends up in [`RuntimeState::last_result`] or as an absent
//! plan. Listeners are notified after each input has been handled.
//!
//! The engine is not internally synchronised: callers serialise access to
//! an instance (see [`SchedulerRegistry`](crate::registry::SchedulerRegistry)).

mod settings;
mod snapshot;

pub use settings::{
    DEFAULT_ACTUATOR_TIMEOUT, DEFAULT_DOOR_OPEN_STATE, SchedulerSettings, program_half_hours,
};
pub use snapshot::SchedulerSnapshot;

use std::collections::BTreeMap;
use std::future::Future;

use chrono::{Duration, NaiveTime, TimeZone};
use serde::Deserialize;

use offpeak_domain::error::{PlanError, ValidationError};
use offpeak_domain::options::{OptionUpdate, SchedulerOptions};
use offpeak_domain::price::{PriceCurve, find_cheapest_window};
use offpeak_domain::schedule::{Plan, PlanSource, PlanningMode, RunResult, RuntimeState};
use offpeak_domain::signal::{StateChanged, is_ready, parse_cheapest_hour};
use offpeak_domain::time::{Timestamp, next_minute, same_minute};

use crate::listeners::{ListenerHandle, Listeners};
use crate::ports::{Actuator, ActuatorError, Clock, StateReader};

const HALF_HOUR_MINUTES: u32 = 30;

fn default_duration_half_hours() -> u32 {
    2
}

fn default_arm() -> bool {
    true
}

/// Arguments of [`Scheduler::schedule_from_prices`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PriceScheduleRequest {
    /// Price curve signal; the scheduler's configured one when absent.
    #[serde(default)]
    pub price_entity: Option<String>,
    #[serde(default = "default_duration_half_hours")]
    pub duration_half_hours: u32,
    /// Program name to half-hour units; the configured mapping when absent.
    #[serde(default)]
    pub program_durations: Option<BTreeMap<String, i64>>,
    #[serde(default = "default_arm")]
    pub arm: bool,
}

impl Default for PriceScheduleRequest {
    fn default() -> Self {
        Self {
            price_entity: None,
            duration_half_hours: default_duration_half_hours(),
            program_durations: None,
            arm: default_arm(),
        }
    }
}

/// Engine instance for one managed device.
pub struct Scheduler<R, A, C> {
    settings: SchedulerSettings,
    options: SchedulerOptions,
    state: RuntimeState,
    listeners: Listeners,
    reader: R,
    actuator: A,
    clock: C,
}

impl<R, A, C> std::fmt::Debug for Scheduler<R, A, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("name", &self.settings.name)
            .field("options", &self.options)
            .field("state", &self.state)
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

impl<R, A, C> Scheduler<R, A, C>
where
    R: StateReader,
    A: Actuator,
    C: Clock,
{
    /// Create an unarmed scheduler with an empty runtime state.
    pub fn new(
        settings: SchedulerSettings,
        options: SchedulerOptions,
        reader: R,
        actuator: A,
        clock: C,
    ) -> Self {
        Self {
            settings,
            options,
            state: RuntimeState::default(),
            listeners: Listeners::default(),
            reader,
            actuator,
            clock,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    #[must_use]
    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    #[must_use]
    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    #[must_use]
    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    /// Shared handle on the listener registry, usable without holding the
    /// scheduler.
    #[must_use]
    pub fn listeners(&self) -> Listeners {
        self.listeners.clone()
    }

    pub fn add_listener<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(&SchedulerSnapshot) + Send + Sync + 'static,
    {
        self.listeners.add(callback)
    }

    #[must_use]
    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot::new(&self.settings.name, &self.state, &self.options)
    }

    fn notify(&self) {
        self.listeners.notify(&self.snapshot());
    }

    /// Arm or disarm. Arming recomputes the plan.
    #[tracing::instrument(skip(self), fields(scheduler = %self.settings.name))]
    pub async fn set_armed(&mut self, armed: bool) {
        self.state.armed = armed;
        if armed {
            let now = self.clock.now();
            self.refresh_plan(now).await;
        }
        self.notify();
    }

    /// Recompute the planned start from the current mode and signals.
    #[tracing::instrument(skip(self), fields(scheduler = %self.settings.name))]
    pub async fn recompute(&mut self) {
        let now = self.clock.now();
        self.refresh_plan(now).await;
        self.notify();
    }

    /// Validate and apply an option change, recomputing when it affects
    /// planning.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] of a rejected update; nothing changes.
    #[tracing::instrument(skip(self), fields(scheduler = %self.settings.name))]
    pub async fn apply_option(&mut self, update: &OptionUpdate) -> Result<(), ValidationError> {
        self.options.apply(update)?;
        if update.affects_plan() {
            let now = self.clock.now();
            self.refresh_plan(now).await;
        }
        self.notify();
        Ok(())
    }

    /// Evaluate one minute boundary. Returns the recorded result when an
    /// attempt was made.
    pub async fn handle_minute_tick(&mut self, now: Timestamp) -> Option<RunResult> {
        let outcome = self.evaluate_tick(now).await;
        self.notify();
        outcome
    }

    async fn evaluate_tick(&mut self, now: Timestamp) -> Option<RunResult> {
        if !self.state.armed {
            return None;
        }
        let Some(plan) = self.state.plan else {
            self.refresh_plan(now).await;
            return None;
        };
        if !same_minute(now, plan.start) {
            return None;
        }

        let name = self.settings.name.as_str();
        if plan.is_window_bound()
            && !self.options.window().contains_span(
                plan.start,
                i64::from(plan.duration_minutes),
                &self.settings.timezone,
            )
        {
            tracing::warn!(scheduler = %name, window = %self.options.window(), "planned run no longer fits the allowed window, disarming");
            self.state.record_attempt(now, RunResult::OutsideWindow);
            self.state.armed = false;
            return Some(RunResult::OutsideWindow);
        }

        let status = self.reader.read(&self.settings.status_entity).await;
        let status = status.as_ref().map(|signal| signal.state.as_str());
        if !is_ready(status, &self.options.ready_substring) {
            tracing::info!(scheduler = %name, status = ?status, "device not ready at planned start");
            self.state.record_attempt(now, RunResult::NotReady);
            return Some(RunResult::NotReady);
        }

        match self.start_device().await {
            Ok(()) => {
                tracing::info!(scheduler = %name, "device started");
                self.state.record_attempt(now, RunResult::Started);
                self.state.mark_started(now);
                Some(RunResult::Started)
            }
            Err(err) => {
                tracing::error!(scheduler = %name, error = %err, "failed to start device");
                self.state.record_attempt(now, RunResult::StartFailed);
                Some(RunResult::StartFailed)
            }
        }
    }

    async fn start_device(&self) -> Result<(), ActuatorError> {
        if let Some(switch) = &self.settings.power_switch_entity {
            let is_on = self
                .reader
                .read(switch)
                .await
                .is_some_and(|signal| signal.is_on());
            if !is_on {
                tracing::debug!(scheduler = %self.settings.name, %switch, "turning power on");
                self.bounded(self.actuator.turn_on(switch)).await?;
            }
        }
        self.bounded(self.actuator.press(&self.settings.start_button_entity))
            .await
    }

    async fn bounded(
        &self,
        call: impl Future<Output = Result<(), ActuatorError>>,
    ) -> Result<(), ActuatorError> {
        tokio::time::timeout(self.settings.actuator_timeout, call)
            .await
            .unwrap_or(Err(ActuatorError::Timeout))
    }

    /// React to a state transition of the door sensor. Returns whether the
    /// runtime state was reset.
    pub fn handle_door_event(&mut self, event: &StateChanged) -> bool {
        if !self.settings.watches_door(&event.entity_id) || self.state.started_at.is_none() {
            return false;
        }
        let Some(new_state) = event.new_state.as_deref() else {
            return false;
        };
        if event.old_state.as_deref() == Some(new_state)
            || !new_state
                .trim()
                .eq_ignore_ascii_case(&self.settings.door_open_state)
        {
            return false;
        }

        tracing::info!(scheduler = %self.settings.name, door = %event.entity_id, "door opened after run, resetting");
        self.state.reset_on_door_open();
        self.notify();
        true
    }

    /// Plan the cheapest contiguous run from a price curve, arming when
    /// `request.arm` is set. The armed flag is never cleared here; on failure
    /// only the plan is.
    #[tracing::instrument(skip(self), fields(scheduler = %self.settings.name))]
    pub async fn schedule_from_prices(&mut self, request: PriceScheduleRequest) -> Option<Plan> {
        let now = self.clock.now();
        let outcome = match self.plan_from_prices(&request, now).await {
            Ok(plan) => {
                tracing::info!(start = %plan.start, end = %plan.end(), "planned run from price curve");
                self.state.set_plan(plan);
                if request.arm {
                    self.state.armed = true;
                }
                Some(plan)
            }
            Err(err) => {
                log_plan_error(&self.settings.name, &err);
                self.state.clear_plan();
                None
            }
        };
        self.notify();
        outcome
    }

    async fn plan_from_prices(
        &self,
        request: &PriceScheduleRequest,
        now: Timestamp,
    ) -> Result<Plan, PlanError> {
        let entity = request
            .price_entity
            .as_deref()
            .or(self.settings.price_entity.as_deref())
            .ok_or_else(|| PlanError::ConfigurationUnavailable("price entity".to_string()))?;
        let signal = self
            .reader
            .read(entity)
            .await
            .ok_or_else(|| PlanError::ConfigurationUnavailable(entity.to_string()))?;

        let durations = request
            .program_durations
            .as_ref()
            .unwrap_or(&self.settings.program_durations);
        let half_hours = self
            .selected_program_half_hours(durations)
            .await
            .unwrap_or(request.duration_half_hours);
        let duration_minutes = half_hours.saturating_mul(HALF_HOUR_MINUTES);

        let tz = &self.settings.timezone;
        let slots = PriceCurve::from_attributes(&signal.attributes, tz).normalize(now);
        let found = find_cheapest_window(
            &slots,
            i64::from(duration_minutes),
            &self.options.window(),
            tz,
        )?;
        Ok(Plan::new(found.start, duration_minutes, PlanSource::PriceWindow))
    }

    async fn selected_program_half_hours(&self, durations: &BTreeMap<String, i64>) -> Option<u32> {
        if durations.is_empty() {
            return None;
        }
        let select = self.settings.program_select_entity.as_deref()?;
        let program = self.reader.read(select).await?;
        program_half_hours(durations, &program.state)
    }

    async fn refresh_plan(&mut self, now: Timestamp) {
        match self.next_plan(now).await {
            Ok(plan) => {
                tracing::info!(scheduler = %self.settings.name, start = %plan.start, end = %plan.end(), source = ?plan.source, "planned start computed");
                self.state.set_plan(plan);
            }
            Err(err) => {
                log_plan_error(&self.settings.name, &err);
                self.state.clear_plan();
            }
        }
    }

    async fn next_plan(&self, now: Timestamp) -> Result<Plan, PlanError> {
        match self.options.planning_mode {
            PlanningMode::StartNow => Ok(Plan::new(
                next_minute(now),
                self.options.default_duration_minutes,
                PlanSource::Immediate,
            )),
            PlanningMode::CheapestIn24h => self.plan_cheapest_hour(now).await,
        }
    }

    async fn plan_cheapest_hour(&self, now: Timestamp) -> Result<Plan, PlanError> {
        let entity = &self.settings.cheapest_hour_entity;
        let signal = self
            .reader
            .read(entity)
            .await
            .ok_or_else(|| PlanError::ConfigurationUnavailable(entity.clone()))?;
        let tz = &self.settings.timezone;
        let hour = parse_cheapest_hour(&signal.state, tz)?;
        let start = next_occurrence_of_hour(now, hour, tz)?;

        let duration_minutes = self
            .selected_program_half_hours(&self.settings.program_durations)
            .await
            .map_or(self.options.default_duration_minutes, |units| {
                units.saturating_mul(HALF_HOUR_MINUTES)
            });
        if !self
            .options
            .window()
            .contains_span(start, i64::from(duration_minutes), tz)
        {
            return Err(PlanError::WindowViolation);
        }
        Ok(Plan::new(start, duration_minutes, PlanSource::CheapestHour))
    }
}

/// The first `hour:00` in `tz` strictly after `now`.
fn next_occurrence_of_hour<Tz: TimeZone>(
    now: Timestamp,
    hour: u32,
    tz: &Tz,
) -> Result<Timestamp, PlanError> {
    let time = NaiveTime::from_hms_opt(hour, 0, 0).ok_or(PlanError::OutOfRange(i64::from(hour)))?;
    let today = now.with_timezone(tz).date_naive();
    // Two days covers an hour skipped by a daylight-saving jump.
    (0..=2)
        .filter_map(|offset| today.checked_add_signed(Duration::days(offset)))
        .filter_map(|day| tz.from_local_datetime(&day.and_time(time)).earliest())
        .map(|local| local.to_utc())
        .find(|candidate| *candidate > now)
        .ok_or(PlanError::OutOfRange(i64::from(hour)))
}

fn log_plan_error(scheduler: &str, err: &PlanError) {
    match err {
        PlanError::InsufficientData { .. } => {
            tracing::info!(%scheduler, error = %err, "no plan available");
        }
        _ => tracing::warn!(%scheduler, error = %err, "no plan available, clearing planned start"),
    }
}
