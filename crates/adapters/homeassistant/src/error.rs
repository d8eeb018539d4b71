//! Home Assistant adapter error type.

use offpeak_app::ports::ActuatorError;

/// Errors talking to the Home Assistant REST API.
#[derive(Debug, thiserror::Error)]
pub enum HaError {
    /// The request could not be sent or its body could not be read.
    #[error("http error")]
    Http(#[from] reqwest::Error),

    /// The token was refused.
    #[error("authentication failed")]
    Unauthorized,

    /// Home Assistant answered with an unexpected status.
    #[error("unexpected status {status}: {message}")]
    Api { status: u16, message: String },
}

impl HaError {
    /// Translate into the actuator port's error for `entity_id`.
    #[must_use]
    pub fn into_actuator_error(self, entity_id: &str) -> ActuatorError {
        let entity_id = entity_id.to_string();
        match self {
            Self::Http(err) if err.is_timeout() => ActuatorError::Timeout,
            Self::Http(err) => ActuatorError::Unavailable {
                entity_id,
                reason: err.to_string(),
            },
            other => ActuatorError::Rejected {
                entity_id,
                reason: other.to_string(),
            },
        }
    }
}
