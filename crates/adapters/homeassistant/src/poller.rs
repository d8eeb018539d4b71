//! Polls watched entities through the REST API at a fixed interval and
//! publishes their state changes on the bus.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::watch;

use offpeak_app::ports::{Clock, EventPublisher, StateReader};
use offpeak_domain::signal::StateChanged;

/// Last observed state per watched entity.
#[derive(Debug, Default)]
pub struct StatePoller {
    entities: Vec<String>,
    last: HashMap<String, Option<String>>,
}

impl StatePoller {
    #[must_use]
    pub fn new(entities: Vec<String>) -> Self {
        Self {
            entities,
            last: HashMap::new(),
        }
    }

    /// Read every watched entity once and publish those whose state string
    /// differs from the previous poll. The first poll only records a baseline.
    /// Returns the number of published changes.
    pub async fn poll_once<R, P, C>(&mut self, reader: &R, publisher: &P, clock: &C) -> usize
    where
        R: StateReader,
        P: EventPublisher,
        C: Clock,
    {
        let mut published = 0;
        for entity_id in &self.entities {
            let current = reader.read(entity_id).await.map(|signal| signal.state);
            let Some(previous) = self.last.insert(entity_id.clone(), current.clone()) else {
                continue;
            };
            if previous == current {
                continue;
            }
            let event = StateChanged {
                entity_id: entity_id.clone(),
                old_state: previous,
                new_state: current,
                at: clock.now(),
            };
            tracing::debug!(entity_id = %event.entity_id, old = ?event.old_state, new = ?event.new_state, "state changed");
            match publisher.publish(event).await {
                Ok(()) => published += 1,
                Err(err) => tracing::warn!(error = %err, "failed to publish state change"),
            }
        }
        published
    }
}

/// Poll every `interval` until shutdown.
pub async fn run_state_poller<R, P, C>(
    mut poller: StatePoller,
    reader: R,
    publisher: P,
    clock: C,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    R: StateReader,
    P: EventPublisher,
    C: Clock,
{
    tracing::info!(entities = poller.entities.len(), ?interval, "state poller started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    while !*shutdown.borrow() {
        tokio::select! {
            _ = ticker.tick() => {
                poller.poll_once(&reader, &publisher, &clock).await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    tracing::debug!("state poller stopped");
}
