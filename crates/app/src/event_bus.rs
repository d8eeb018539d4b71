//! In-process event bus backed by a tokio broadcast channel.

use std::future::Future;

use tokio::sync::broadcast;

use offpeak_domain::error::OffpeakError;
use offpeak_domain::signal::StateChanged;

use crate::ports::EventPublisher;

/// In-process bus for [`StateChanged`] events using a tokio [`broadcast`]
/// channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the event is simply dropped).
pub struct InProcessEventBus {
    sender: broadcast::Sender<StateChanged>,
}

impl InProcessEventBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events published *after* this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StateChanged> {
        self.sender.subscribe()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(
        &self,
        event: StateChanged,
    ) -> impl Future<Output = Result<(), OffpeakError>> + Send {
        // Only fails without receivers.
        let _ = self.sender.send(event);
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offpeak_domain::time::now;

    fn door(new_state: &str) -> StateChanged {
        StateChanged {
            entity_id: "binary_sensor.dishwasher_door".to_string(),
            old_state: None,
            new_state: Some(new_state.to_string()),
            at: now(),
        }
    }

    #[tokio::test]
    async fn should_deliver_event_to_subscriber() {
        let bus = InProcessEventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(door("on")).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.new_state.as_deref(), Some("on"));
    }

    #[tokio::test]
    async fn should_deliver_event_to_multiple_subscribers() {
        let bus = InProcessEventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(door("off")).await.unwrap();

        assert_eq!(rx1.recv().await.unwrap().new_state.as_deref(), Some("off"));
        assert_eq!(rx2.recv().await.unwrap().new_state.as_deref(), Some("off"));
    }

    #[tokio::test]
    async fn should_succeed_when_no_subscribers() {
        let bus = InProcessEventBus::new(16);
        assert!(bus.publish(door("on")).await.is_ok());
    }

    #[tokio::test]
    async fn should_not_deliver_events_published_before_subscription() {
        let bus = InProcessEventBus::new(16);
        bus.publish(door("on")).await.unwrap();

        let mut rx = bus.subscribe();
        bus.publish(door("off")).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.new_state.as_deref(), Some("off"));
    }
}
