//! State reader port: current value of an external signal.

use std::future::Future;

use offpeak_domain::signal::SignalState;

/// Reads the current state of external signals (sensors, selects, switches).
pub trait StateReader: Send + Sync {
    /// Current state of `entity_id`, `None` when the signal does not exist
    /// or cannot be reached.
    fn read(&self, entity_id: &str) -> impl Future<Output = Option<SignalState>> + Send;
}

impl<T: StateReader> StateReader for std::sync::Arc<T> {
    fn read(&self, entity_id: &str) -> impl Future<Output = Option<SignalState>> + Send {
        (**self).read(entity_id)
    }
}
