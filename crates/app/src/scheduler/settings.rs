//! Static wiring of one scheduler: which entities it reads and drives.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono_tz::Tz;

pub const DEFAULT_DOOR_OPEN_STATE: &str = "on";
pub const DEFAULT_ACTUATOR_TIMEOUT: Duration = Duration::from_secs(30);

/// Entity ids and environment for one managed device.
///
/// Unlike [`SchedulerOptions`](offpeak_domain::options::SchedulerOptions),
/// settings never change while the engine runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerSettings {
    pub name: String,
    pub cheapest_hour_entity: String,
    pub status_entity: String,
    pub start_button_entity: String,
    pub price_entity: Option<String>,
    pub program_select_entity: Option<String>,
    pub door_sensor_entity: Option<String>,
    pub power_switch_entity: Option<String>,
    /// Door sensor state meaning "opened".
    pub door_open_state: String,
    /// Program name to duration, in half-hour units.
    pub program_durations: BTreeMap<String, i64>,
    pub timezone: Tz,
    pub actuator_timeout: Duration,
}

impl SchedulerSettings {
    /// Settings with the three mandatory entities and every optional one unset.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        cheapest_hour_entity: impl Into<String>,
        status_entity: impl Into<String>,
        start_button_entity: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            cheapest_hour_entity: cheapest_hour_entity.into(),
            status_entity: status_entity.into(),
            start_button_entity: start_button_entity.into(),
            price_entity: None,
            program_select_entity: None,
            door_sensor_entity: None,
            power_switch_entity: None,
            door_open_state: DEFAULT_DOOR_OPEN_STATE.to_string(),
            program_durations: BTreeMap::new(),
            timezone: Tz::UTC,
            actuator_timeout: DEFAULT_ACTUATOR_TIMEOUT,
        }
    }

    /// Whether `entity_id` is this scheduler's door sensor.
    #[must_use]
    pub fn watches_door(&self, entity_id: &str) -> bool {
        self.door_sensor_entity.as_deref() == Some(entity_id)
    }
}

/// Look up `program` in `durations` (case-insensitive, surrounding blanks
/// ignored). Non-positive entries count as missing.
#[must_use]
pub fn program_half_hours(durations: &BTreeMap<String, i64>, program: &str) -> Option<u32> {
    let program = program.trim();
    durations
        .iter()
        .find(|(name, _)| name.trim().eq_ignore_ascii_case(program))
        .and_then(|(_, units)| u32::try_from(*units).ok())
        .filter(|units| *units > 0)
}
