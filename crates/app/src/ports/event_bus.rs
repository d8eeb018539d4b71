//! Event bus port: publish/subscribe for signal transitions.

use std::future::Future;

use offpeak_domain::error::OffpeakError;
use offpeak_domain::signal::StateChanged;

/// Publishes state transitions to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(
        &self,
        event: StateChanged,
    ) -> impl Future<Output = Result<(), OffpeakError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(
        &self,
        event: StateChanged,
    ) -> impl Future<Output = Result<(), OffpeakError>> + Send {
        (**self).publish(event)
    }
}
