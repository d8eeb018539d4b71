//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`OffpeakError`]
//! via `#[from]` when a failure has to cross a port boundary. Planning
//! failures ([`PlanError`]) never do: the engine records them as an absent
//! plan instead.

/// Top-level error surfaced to callers of command paths (option updates,
/// scheduler lookups, persistence).
#[derive(Debug, thiserror::Error)]
pub enum OffpeakError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A user-supplied value violates a domain invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("ready substring must not be empty")]
    EmptyReadySubstring,

    #[error("duration must be a positive number of minutes")]
    NonPositiveDuration,

    #[error("unknown planning mode: {0}")]
    UnknownPlanningMode(String),
}

/// A named resource does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} not found: {id}")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// Why no plan could be produced.
///
/// These are handled where they are detected: the engine clears its plan
/// and logs the reason, nothing is propagated to tick or arm callers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    /// A referenced external signal does not exist.
    #[error("signal {0} is not available")]
    ConfigurationUnavailable(String),

    /// A signal value cannot be converted to the expected type.
    #[error("cannot parse {what} from {value:?}")]
    UnparsableValue { what: &'static str, value: String },

    /// A parsed hour lies outside `0..=23`.
    #[error("hour {0} is out of range")]
    OutOfRange(i64),

    /// Fewer usable price slots than the requested run needs.
    #[error("insufficient price data: {available} slots available, {required} required")]
    InsufficientData { available: usize, required: usize },

    /// The candidate run does not fit the allowed window.
    #[error("candidate run does not fit the allowed window")]
    WindowViolation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_wrap_validation_error_via_from() {
        let err: OffpeakError = ValidationError::EmptyName.into();
        assert!(matches!(
            err,
            OffpeakError::Validation(ValidationError::EmptyName)
        ));
    }

    #[test]
    fn should_display_not_found_with_entity_and_id() {
        let err = NotFoundError {
            entity: "Scheduler",
            id: "dishwasher".to_string(),
        };
        assert_eq!(err.to_string(), "Scheduler not found: dishwasher");
    }

    #[test]
    fn should_display_insufficient_data_counts() {
        let err = PlanError::InsufficientData {
            available: 3,
            required: 4,
        };
        assert_eq!(
            err.to_string(),
            "insufficient price data: 3 slots available, 4 required"
        );
    }
}
