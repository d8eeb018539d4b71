//! Background tasks driving the schedulers: the minute ticker and the door
//! watcher. Both stop when the shutdown channel flips to `true` (or its
//! sender is dropped).

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use offpeak_domain::signal::StateChanged;
use offpeak_domain::time::{Timestamp, next_minute, truncate_to_minute};

use crate::ports::{Actuator, Clock, StateReader};
use crate::registry::SchedulerRegistry;

/// Tick every scheduler once with `now`.
pub async fn tick_all<R, A, C>(registry: &SchedulerRegistry<R, A, C>, now: Timestamp)
where
    R: StateReader,
    A: Actuator,
    C: Clock,
{
    for (name, scheduler) in registry.iter() {
        let outcome = scheduler.lock().await.handle_minute_tick(now).await;
        if let Some(result) = outcome {
            tracing::info!(scheduler = %name, %result, "tick evaluated planned start");
        }
    }
}

/// Sleep to each minute boundary of `clock`, then tick every scheduler.
pub async fn run_minute_ticker<R, A, C, K>(
    registry: Arc<SchedulerRegistry<R, A, C>>,
    clock: K,
    mut shutdown: watch::Receiver<bool>,
) where
    R: StateReader,
    A: Actuator,
    C: Clock,
    K: Clock,
{
    tracing::info!(schedulers = registry.len(), "minute ticker started");
    while !*shutdown.borrow() {
        let now = clock.now();
        let wait = (next_minute(now) - now).to_std().unwrap_or_default();
        tokio::select! {
            () = tokio::time::sleep(wait) => {
                tick_all(&registry, truncate_to_minute(clock.now())).await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    tracing::info!("minute ticker stopped");
}

/// Hand one state change to every scheduler watching that door sensor.
/// Returns how many were reset.
pub async fn dispatch_door_event<R, A, C>(
    registry: &SchedulerRegistry<R, A, C>,
    event: &StateChanged,
) -> usize
where
    R: StateReader,
    A: Actuator,
    C: Clock,
{
    let mut reset = 0;
    for (_, scheduler) in registry.iter() {
        let mut scheduler = scheduler.lock().await;
        if scheduler.settings().watches_door(&event.entity_id) && scheduler.handle_door_event(event)
        {
            reset += 1;
        }
    }
    reset
}

/// Forward bus events to the schedulers' door handlers until shutdown.
pub async fn run_door_watcher<R, A, C>(
    registry: Arc<SchedulerRegistry<R, A, C>>,
    mut events: broadcast::Receiver<StateChanged>,
    mut shutdown: watch::Receiver<bool>,
) where
    R: StateReader,
    A: Actuator,
    C: Clock,
{
    while !*shutdown.borrow() {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    dispatch_door_event(&registry, &event).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "door watcher lagged behind, some events were dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    tracing::debug!("door watcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::{StaticClock, TestRegistry, scheduler};
    use chrono::{TimeZone, Utc};
    use offpeak_domain::schedule::RunResult;

    fn at(day: u32, hour: u32, minute: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2025, 1, day, hour, minute, 0).unwrap()
    }

    async fn started_registry() -> TestRegistry {
        let mut registry = TestRegistry::new(8);
        let shared = registry.insert(scheduler(
            "dishwasher",
            &[
                ("sensor.dishwasher_cheapest_hour", "22"),
                ("sensor.dishwasher_status", "Ready"),
            ],
            at(10, 14, 0),
        ));
        shared.lock().await.set_armed(true).await;
        tick_all(&registry, at(10, 22, 0)).await;
        registry
    }

    #[tokio::test]
    async fn should_tick_every_scheduler() {
        let registry = started_registry().await;

        let shared = registry.get("dishwasher").unwrap();
        let scheduler = shared.lock().await;
        assert_eq!(scheduler.state().last_result, RunResult::Started);
    }

    #[tokio::test]
    async fn should_reset_scheduler_watching_opened_door() {
        let registry = started_registry().await;
        let event = StateChanged {
            entity_id: "binary_sensor.dishwasher_door".to_string(),
            old_state: Some("off".to_string()),
            new_state: Some("on".to_string()),
            at: at(11, 0, 30),
        };

        assert_eq!(dispatch_door_event(&registry, &event).await, 1);

        let shared = registry.get("dishwasher").unwrap();
        assert_eq!(
            shared.lock().await.state().last_result,
            RunResult::ResetOnDoorOpen
        );
    }

    #[tokio::test]
    async fn should_ignore_unwatched_entities() {
        let registry = started_registry().await;
        let event = StateChanged {
            entity_id: "binary_sensor.garage_door".to_string(),
            old_state: Some("off".to_string()),
            new_state: Some("on".to_string()),
            at: at(11, 0, 30),
        };

        assert_eq!(dispatch_door_event(&registry, &event).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_ticker_on_shutdown() {
        let registry = Arc::new(TestRegistry::new(8));
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_minute_ticker(
            registry,
            StaticClock(at(10, 14, 0)),
            rx,
        ));

        tx.send(true).unwrap();

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn should_stop_door_watcher_when_bus_closes() {
        let registry = Arc::new(TestRegistry::new(8));
        let (events_tx, events_rx) = broadcast::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_door_watcher(registry, events_rx, shutdown_rx));

        drop(events_tx);

        handle.await.unwrap();
    }
}
