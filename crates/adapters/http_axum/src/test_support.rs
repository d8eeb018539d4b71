//! In-memory port fakes shared by the handler tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};

use offpeak_app::ports::{Actuator, ActuatorError, Clock, OptionsStore, StateReader};
use offpeak_app::registry::SchedulerRegistry;
use offpeak_app::scheduler::{Scheduler, SchedulerSettings};
use offpeak_app::services::control_service::ControlService;
use offpeak_domain::error::OffpeakError;
use offpeak_domain::options::{OptionUpdate, SchedulerOptions};
use offpeak_domain::signal::SignalState;
use offpeak_domain::time::Timestamp;

use crate::state::AppState;

pub struct StaticReader(pub HashMap<String, String>);

impl StateReader for StaticReader {
    fn read(&self, entity_id: &str) -> impl Future<Output = Option<SignalState>> + Send {
        let state = self.0.get(entity_id).map(SignalState::new);
        async move { state }
    }
}

pub struct NoopActuator;

impl Actuator for NoopActuator {
    fn press(&self, _entity_id: &str) -> impl Future<Output = Result<(), ActuatorError>> + Send {
        async { Ok(()) }
    }

    fn turn_on(&self, _entity_id: &str) -> impl Future<Output = Result<(), ActuatorError>> + Send {
        async { Ok(()) }
    }
}

pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

#[derive(Default)]
pub struct MemoryStore(pub Mutex<Vec<(String, OptionUpdate)>>);

impl OptionsStore for MemoryStore {
    fn save(
        &self,
        scheduler: &str,
        update: &OptionUpdate,
    ) -> impl Future<Output = Result<(), OffpeakError>> + Send {
        self.0
            .lock()
            .unwrap()
            .push((scheduler.to_string(), update.clone()));
        async { Ok(()) }
    }

    fn load(
        &self,
        scheduler: &str,
    ) -> impl Future<Output = Result<Vec<OptionUpdate>, OffpeakError>> + Send {
        let updates = self
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == scheduler)
            .map(|(_, update)| update.clone())
            .collect();
        async { Ok(updates) }
    }
}

pub type TestState = AppState<StaticReader, NoopActuator, FixedClock, MemoryStore>;

pub fn now() -> Timestamp {
    Utc.with_ymd_and_hms(2025, 1, 10, 14, 0, 0).unwrap()
}

/// One `dishwasher` scheduler whose cheapest hour is 23:00.
pub fn test_state() -> TestState {
    let settings = SchedulerSettings::new(
        "dishwasher",
        "sensor.cheapest_hour",
        "sensor.dishwasher_status",
        "button.dishwasher_start",
    );
    let reader = StaticReader(HashMap::from([
        ("sensor.cheapest_hour".to_string(), "23".to_string()),
        ("sensor.dishwasher_status".to_string(), "Ready".to_string()),
    ]));
    let scheduler = Scheduler::new(
        settings,
        SchedulerOptions::default(),
        reader,
        NoopActuator,
        FixedClock(now()),
    );
    let mut registry = SchedulerRegistry::new(16);
    registry.insert(scheduler);
    AppState::new(ControlService::new(Arc::new(registry), MemoryStore::default()))
}
