//! Virtual dishwasher: status text, start button, power switch, door sensor
//! and program select.

use std::sync::{Mutex, MutexGuard, PoisonError};

use offpeak_app::ports::ActuatorError;
use offpeak_domain::signal::{SignalState, StateChanged};
use offpeak_domain::time::Timestamp;

const PROGRAMS: [&str; 4] = ["eco", "intensive", "quick", "auto"];

/// Entity ids exposed by one virtual dishwasher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DishwasherEntities {
    pub status: String,
    pub start_button: String,
    pub power_switch: String,
    pub door_sensor: String,
    pub program_select: String,
}

impl DishwasherEntities {
    fn for_name(name: &str) -> Self {
        Self {
            status: format!("sensor.{name}_status"),
            start_button: format!("button.{name}_start"),
            power_switch: format!("switch.{name}_power"),
            door_sensor: format!("binary_sensor.{name}_door"),
            program_select: format!("select.{name}_program"),
        }
    }

    fn owns(&self, entity_id: &str) -> bool {
        [
            &self.status,
            &self.start_button,
            &self.power_switch,
            &self.door_sensor,
            &self.program_select,
        ]
        .into_iter()
        .any(|id| id == entity_id)
    }
}

#[derive(Debug)]
struct State {
    powered: bool,
    door_open: bool,
    running: bool,
    reject_presses: bool,
    program: String,
    last_pressed: Option<Timestamp>,
}

impl State {
    fn status(&self) -> &'static str {
        if !self.powered {
            "Off"
        } else if self.running {
            "Running"
        } else if self.door_open {
            "Door open"
        } else {
            "Ready"
        }
    }
}

/// A simulated dishwasher. Starts powered, door closed, idle on `eco`.
#[derive(Debug)]
pub struct VirtualDishwasher {
    name: String,
    entities: DishwasherEntities,
    state: Mutex<State>,
}

impl VirtualDishwasher {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            entities: DishwasherEntities::for_name(&name),
            name,
            state: Mutex::new(State {
                powered: true,
                door_open: false,
                running: false,
                reject_presses: false,
                program: PROGRAMS[0].to_string(),
                last_pressed: None,
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn entities(&self) -> &DishwasherEntities {
        &self.entities
    }

    #[must_use]
    pub fn owns(&self, entity_id: &str) -> bool {
        self.entities.owns(entity_id)
    }

    /// Current state of one of this device's entities.
    #[must_use]
    pub fn read(&self, entity_id: &str) -> Option<SignalState> {
        let state = self.lock_state();
        let on_off = |flag: bool| if flag { "on" } else { "off" };
        let signal = if entity_id == self.entities.status {
            SignalState::new(state.status())
        } else if entity_id == self.entities.power_switch {
            SignalState::new(on_off(state.powered))
        } else if entity_id == self.entities.door_sensor {
            SignalState::new(on_off(state.door_open))
        } else if entity_id == self.entities.program_select {
            SignalState::new(state.program.as_str())
                .with_attributes(serde_json::json!({ "options": PROGRAMS }))
        } else if entity_id == self.entities.start_button {
            SignalState::new(
                state
                    .last_pressed
                    .map_or_else(|| "unknown".to_string(), |at| at.to_rfc3339()),
            )
        } else {
            return None;
        };
        Some(signal)
    }

    /// Press the start button.
    ///
    /// # Errors
    ///
    /// - [`ActuatorError::Unavailable`] while powered off
    /// - [`ActuatorError::Rejected`] when presses are forced to fail, the door
    ///   is open or a run is already in progress
    pub fn press(&self, at: Timestamp) -> Result<Vec<StateChanged>, ActuatorError> {
        let mut state = self.lock_state();
        let rejected = |reason: &str| ActuatorError::Rejected {
            entity_id: self.entities.start_button.clone(),
            reason: reason.to_string(),
        };
        if !state.powered {
            return Err(ActuatorError::Unavailable {
                entity_id: self.entities.start_button.clone(),
                reason: "powered off".to_string(),
            });
        }
        if state.reject_presses {
            return Err(rejected("simulated failure"));
        }
        if state.door_open {
            return Err(rejected("door open"));
        }
        if state.running {
            return Err(rejected("already running"));
        }
        let before = state.status();
        state.running = true;
        state.last_pressed = Some(at);
        Ok(self.status_change(before, state.status(), at))
    }

    /// Switch the power on. Idempotent.
    pub fn turn_on(&self, at: Timestamp) -> Vec<StateChanged> {
        self.update(at, |state| state.powered = true, &self.entities.power_switch)
    }

    pub fn turn_off(&self, at: Timestamp) -> Vec<StateChanged> {
        self.update(
            at,
            |state| {
                state.powered = false;
                state.running = false;
            },
            &self.entities.power_switch,
        )
    }

    pub fn open_door(&self, at: Timestamp) -> Vec<StateChanged> {
        self.update(at, |state| state.door_open = true, &self.entities.door_sensor)
    }

    pub fn close_door(&self, at: Timestamp) -> Vec<StateChanged> {
        self.update(at, |state| state.door_open = false, &self.entities.door_sensor)
    }

    /// End the current run, if any.
    pub fn finish_run(&self, at: Timestamp) -> Vec<StateChanged> {
        self.update(at, |state| state.running = false, &self.entities.status)
    }

    /// Make every following press fail (or succeed again).
    pub fn reject_presses(&self, reject: bool) {
        self.lock_state().reject_presses = reject;
    }

    /// Select a program. Unknown programs are accepted as-is.
    pub fn select_program(&self, program: &str, at: Timestamp) -> Vec<StateChanged> {
        let program = program.to_string();
        self.update(
            at,
            move |state| state.program = program,
            &self.entities.program_select,
        )
    }

    /// Apply `mutate`, returning the changes of `entity_id` and of the status
    /// text it caused.
    fn update(
        &self,
        at: Timestamp,
        mutate: impl FnOnce(&mut State),
        entity_id: &str,
    ) -> Vec<StateChanged> {
        let before_entity = self.read(entity_id).map(|s| s.state);
        let before_status = self.lock_state().status();
        mutate(&mut self.lock_state());
        let after_entity = self.read(entity_id).map(|s| s.state);
        let after_status = self.lock_state().status();

        let mut changes = Vec::new();
        if entity_id != self.entities.status && before_entity != after_entity {
            changes.push(StateChanged {
                entity_id: entity_id.to_string(),
                old_state: before_entity,
                new_state: after_entity,
                at,
            });
        }
        changes.extend(self.status_change(before_status, after_status, at));
        changes
    }

    fn status_change(&self, before: &str, after: &str, at: Timestamp) -> Vec<StateChanged> {
        if before == after {
            return Vec::new();
        }
        vec![StateChanged {
            entity_id: self.entities.status.clone(),
            old_state: Some(before.to_string()),
            new_state: Some(after.to_string()),
            at,
        }]
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offpeak_domain::time::now;

    fn status(dishwasher: &VirtualDishwasher) -> String {
        dishwasher.read("sensor.dishwasher_status").unwrap().state
    }

    #[test]
    fn should_derive_entity_ids_from_name() {
        let dishwasher = VirtualDishwasher::new("kitchen");
        let entities = dishwasher.entities();
        assert_eq!(entities.start_button, "button.kitchen_start");
        assert_eq!(entities.door_sensor, "binary_sensor.kitchen_door");
        assert!(dishwasher.owns("select.kitchen_program"));
        assert!(!dishwasher.owns("select.dishwasher_program"));
    }

    #[test]
    fn should_report_ready_when_idle_with_door_closed() {
        let dishwasher = VirtualDishwasher::new("dishwasher");
        assert_eq!(status(&dishwasher), "Ready");
    }

    #[test]
    fn should_start_running_when_pressed() {
        let dishwasher = VirtualDishwasher::new("dishwasher");

        let changes = dishwasher.press(now()).unwrap();

        assert_eq!(status(&dishwasher), "Running");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].new_state.as_deref(), Some("Running"));
    }

    #[test]
    fn should_reject_press_when_door_open() {
        let dishwasher = VirtualDishwasher::new("dishwasher");
        dishwasher.open_door(now());

        let result = dishwasher.press(now());

        assert!(matches!(result, Err(ActuatorError::Rejected { .. })));
        assert_eq!(status(&dishwasher), "Door open");
    }

    #[test]
    fn should_reject_press_when_failures_forced() {
        let dishwasher = VirtualDishwasher::new("dishwasher");
        dishwasher.reject_presses(true);

        assert!(dishwasher.press(now()).is_err());

        dishwasher.reject_presses(false);
        assert!(dishwasher.press(now()).is_ok());
    }

    #[test]
    fn should_report_door_and_status_changes() {
        let dishwasher = VirtualDishwasher::new("dishwasher");

        let changes = dishwasher.open_door(now());

        let ids: Vec<_> = changes.iter().map(|c| c.entity_id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["binary_sensor.dishwasher_door", "sensor.dishwasher_status"]
        );
        assert_eq!(changes[0].old_state.as_deref(), Some("off"));
        assert_eq!(changes[0].new_state.as_deref(), Some("on"));
    }

    #[test]
    fn should_not_report_anything_when_nothing_changes() {
        let dishwasher = VirtualDishwasher::new("dishwasher");
        assert!(dishwasher.turn_on(now()).is_empty());
        assert!(dishwasher.close_door(now()).is_empty());
    }

    #[test]
    fn should_be_unavailable_when_powered_off() {
        let dishwasher = VirtualDishwasher::new("dishwasher");
        dishwasher.turn_off(now());

        assert_eq!(status(&dishwasher), "Off");
        assert!(matches!(
            dishwasher.press(now()),
            Err(ActuatorError::Unavailable { .. })
        ));

        let changes = dishwasher.turn_on(now());
        assert_eq!(changes.len(), 2);
        assert_eq!(status(&dishwasher), "Ready");
    }

    #[test]
    fn should_return_to_ready_when_run_finishes() {
        let dishwasher = VirtualDishwasher::new("dishwasher");
        dishwasher.press(now()).unwrap();

        let changes = dishwasher.finish_run(now());

        assert_eq!(status(&dishwasher), "Ready");
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn should_expose_program_options() {
        let dishwasher = VirtualDishwasher::new("dishwasher");
        dishwasher.select_program("quick", now());

        let program = dishwasher.read("select.dishwasher_program").unwrap();

        assert_eq!(program.state, "quick");
        assert_eq!(program.attribute("options").unwrap()[0], "eco");
    }
}
