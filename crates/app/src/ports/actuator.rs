//! Actuator port: the write side of the managed device.

use std::future::Future;

/// Why an actuator call did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActuatorError {
    /// The target refused the call.
    #[error("actuator {entity_id} rejected the call: {reason}")]
    Rejected { entity_id: String, reason: String },

    /// No answer before the configured deadline.
    #[error("actuator call timed out")]
    Timeout,

    /// The target could not be reached.
    #[error("actuator {entity_id} is unavailable: {reason}")]
    Unavailable { entity_id: String, reason: String },
}

/// Triggers actions on the managed device.
///
/// Calls return an explicit result; the engine records failures instead of
/// propagating them.
pub trait Actuator: Send + Sync {
    /// Press a button entity (the start action).
    fn press(&self, entity_id: &str) -> impl Future<Output = Result<(), ActuatorError>> + Send;

    /// Turn a switch entity on.
    fn turn_on(&self, entity_id: &str) -> impl Future<Output = Result<(), ActuatorError>> + Send;
}

impl<T: Actuator> Actuator for std::sync::Arc<T> {
    fn press(&self, entity_id: &str) -> impl Future<Output = Result<(), ActuatorError>> + Send {
        (**self).press(entity_id)
    }

    fn turn_on(&self, entity_id: &str) -> impl Future<Output = Result<(), ActuatorError>> + Send {
        (**self).turn_on(entity_id)
    }
}
