//! # offpeak-adapter-virtual
//!
//! Virtual/demo integration that simulates a home for testing and
//! demonstration purposes.
//!
//! ## Provided entities
//!
//! | Device | Entity ID | Behaviour |
//! |--------|-----------|-----------|
//! | Dishwasher status | `sensor.{name}_status` | `Ready`, `Running`, `Door open` or `Off` |
//! | Start button | `button.{name}_start` | Starts a run when powered, idle and closed |
//! | Power switch | `switch.{name}_power` | Responds to `turn_on` |
//! | Door sensor | `binary_sensor.{name}_door` | `on` while open |
//! | Program select | `select.{name}_program` | `eco`, `intensive`, `quick`, `auto` |
//! | Price | `sensor.electricity_price` | Current price, `raw_today` / `raw_tomorrow` curve |
//! | Cheapest hour | `sensor.cheapest_hour` | Local hour of the cheapest upcoming slot |
//!
//! Every state change is published on the event bus so door openings reach
//! the schedulers.
//!
//! ## Dependency rule
//!
//! Depends on `offpeak-app` (port traits) and `offpeak-domain` only.

mod devices;

use std::future::Future;

use chrono_tz::Tz;

use offpeak_app::ports::{Actuator, ActuatorError, Clock, EventPublisher, StateReader};
use offpeak_domain::signal::{SignalState, StateChanged};
use offpeak_domain::time::Timestamp;

pub use devices::{
    DishwasherEntities, PriceFeedEntities, VirtualDishwasher, VirtualPriceFeed, slot_price,
};

/// Virtual integration hosting simulated dishwashers and one price feed.
pub struct VirtualIntegration<P, C> {
    dishwashers: Vec<VirtualDishwasher>,
    prices: VirtualPriceFeed,
    publisher: P,
    clock: C,
}

impl<P, C> VirtualIntegration<P, C>
where
    P: EventPublisher + Send + Sync,
    C: Clock,
{
    /// Create one dishwasher per name, with prices laid out in `timezone`.
    pub fn new<I, S>(names: I, timezone: Tz, publisher: P, clock: C) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dishwashers: names.into_iter().map(VirtualDishwasher::new).collect(),
            prices: VirtualPriceFeed::new(timezone),
            publisher,
            clock,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        "virtual"
    }

    #[must_use]
    pub fn dishwasher(&self, name: &str) -> Option<&VirtualDishwasher> {
        self.dishwashers.iter().find(|d| d.name() == name)
    }

    pub fn dishwashers(&self) -> impl Iterator<Item = &VirtualDishwasher> {
        self.dishwashers.iter()
    }

    #[must_use]
    pub fn price_entities(&self) -> &PriceFeedEntities {
        self.prices.entities()
    }

    /// Check whether this integration owns the given entity.
    #[must_use]
    pub fn owns_entity(&self, entity_id: &str) -> bool {
        self.prices.owns(entity_id) || self.owner(entity_id).is_some()
    }

    /// Open the door of `name`. Returns `false` for unknown devices.
    pub async fn open_door(&self, name: &str) -> bool {
        self.with_dishwasher(name, VirtualDishwasher::open_door).await
    }

    pub async fn close_door(&self, name: &str) -> bool {
        self.with_dishwasher(name, VirtualDishwasher::close_door).await
    }

    /// End the current run of `name`.
    pub async fn finish_run(&self, name: &str) -> bool {
        self.with_dishwasher(name, VirtualDishwasher::finish_run).await
    }

    /// Force every following start press of `name` to fail, or stop doing so.
    pub fn fail_presses(&self, name: &str, fail: bool) -> bool {
        let Some(dishwasher) = self.dishwasher(name) else {
            return false;
        };
        dishwasher.reject_presses(fail);
        true
    }

    async fn with_dishwasher(
        &self,
        name: &str,
        action: impl FnOnce(&VirtualDishwasher, Timestamp) -> Vec<StateChanged>,
    ) -> bool {
        let Some(dishwasher) = self.dishwasher(name) else {
            return false;
        };
        let changes = action(dishwasher, self.clock.now());
        self.publish_all(changes).await;
        true
    }

    fn owner(&self, entity_id: &str) -> Option<&VirtualDishwasher> {
        self.dishwashers.iter().find(|d| d.owns(entity_id))
    }

    fn unknown(entity_id: &str) -> ActuatorError {
        ActuatorError::Unavailable {
            entity_id: entity_id.to_string(),
            reason: "unknown virtual entity".to_string(),
        }
    }

    async fn publish_all(&self, changes: Vec<StateChanged>) {
        for change in changes {
            if let Err(err) = self.publisher.publish(change).await {
                tracing::warn!(error = %err, "failed to publish virtual state change");
            }
        }
    }
}

impl<P, C> StateReader for VirtualIntegration<P, C>
where
    P: EventPublisher + Send + Sync,
    C: Clock,
{
    fn read(&self, entity_id: &str) -> impl Future<Output = Option<SignalState>> + Send {
        let signal = if self.prices.owns(entity_id) {
            self.prices.read(entity_id, self.clock.now())
        } else {
            self.owner(entity_id)
                .and_then(|dishwasher| dishwasher.read(entity_id))
        };
        async move { signal }
    }
}

impl<P, C> Actuator for VirtualIntegration<P, C>
where
    P: EventPublisher + Send + Sync,
    C: Clock,
{
    fn press(&self, entity_id: &str) -> impl Future<Output = Result<(), ActuatorError>> + Send {
        let entity_id = entity_id.to_string();
        async move {
            let dishwasher = self
                .owner(&entity_id)
                .filter(|d| d.entities().start_button == entity_id)
                .ok_or_else(|| Self::unknown(&entity_id))?;
            let changes = dishwasher.press(self.clock.now())?;
            tracing::info!(device = dishwasher.name(), "virtual dishwasher started");
            self.publish_all(changes).await;
            Ok(())
        }
    }

    fn turn_on(&self, entity_id: &str) -> impl Future<Output = Result<(), ActuatorError>> + Send {
        let entity_id = entity_id.to_string();
        async move {
            let dishwasher = self
                .owner(&entity_id)
                .filter(|d| d.entities().power_switch == entity_id)
                .ok_or_else(|| Self::unknown(&entity_id))?;
            let changes = dishwasher.turn_on(self.clock.now());
            self.publish_all(changes).await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use offpeak_domain::error::OffpeakError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPublisher(Mutex<Vec<StateChanged>>);

    impl RecordingPublisher {
        fn entity_ids(&self) -> Vec<String> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.entity_id.clone())
                .collect()
        }
    }

    impl EventPublisher for RecordingPublisher {
        fn publish(
            &self,
            event: StateChanged,
        ) -> impl Future<Output = Result<(), OffpeakError>> + Send {
            self.0.lock().unwrap().push(event);
            async { Ok(()) }
        }
    }

    struct FixedClock(Timestamp);

    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            self.0
        }
    }

    fn integration() -> VirtualIntegration<RecordingPublisher, FixedClock> {
        VirtualIntegration::new(
            ["dishwasher"],
            Tz::UTC,
            RecordingPublisher::default(),
            FixedClock(Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap()),
        )
    }

    #[tokio::test]
    async fn should_read_dishwasher_and_price_entities() {
        let integration = integration();

        let status = integration.read("sensor.dishwasher_status").await.unwrap();
        let hour = integration.read("sensor.cheapest_hour").await.unwrap();

        assert_eq!(status.state, "Ready");
        assert_eq!(hour.state, "2");
        assert!(integration.read("sensor.unknown").await.is_none());
    }

    #[tokio::test]
    async fn should_start_and_publish_when_button_pressed() {
        let integration = integration();

        integration.press("button.dishwasher_start").await.unwrap();

        let status = integration.read("sensor.dishwasher_status").await.unwrap();
        assert_eq!(status.state, "Running");
        assert_eq!(
            integration.publisher.entity_ids(),
            vec!["sensor.dishwasher_status"]
        );
    }

    #[tokio::test]
    async fn should_reject_press_on_non_button_entity() {
        let integration = integration();
        let result = integration.press("switch.dishwasher_power").await;
        assert!(matches!(result, Err(ActuatorError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn should_fail_presses_when_forced() {
        let integration = integration();
        assert!(integration.fail_presses("dishwasher", true));

        let result = integration.press("button.dishwasher_start").await;

        assert!(matches!(result, Err(ActuatorError::Rejected { .. })));
        assert!(integration.publisher.entity_ids().is_empty());
    }

    #[tokio::test]
    async fn should_publish_door_transitions() {
        let integration = integration();

        assert!(integration.open_door("dishwasher").await);
        assert!(integration.close_door("dishwasher").await);
        assert!(!integration.open_door("dryer").await);

        let ids = integration.publisher.entity_ids();
        assert_eq!(
            ids.iter()
                .filter(|id| *id == "binary_sensor.dishwasher_door")
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn should_accept_turn_on_when_already_powered() {
        let integration = integration();
        integration.turn_on("switch.dishwasher_power").await.unwrap();
        assert!(integration.publisher.entity_ids().is_empty());
    }

    #[tokio::test]
    async fn should_own_its_entities() {
        let integration = integration();
        assert_eq!(integration.name(), "virtual");
        assert!(integration.owns_entity("binary_sensor.dishwasher_door"));
        assert!(integration.owns_entity("sensor.electricity_price"));
        assert!(!integration.owns_entity("light.kitchen"));
    }
}
