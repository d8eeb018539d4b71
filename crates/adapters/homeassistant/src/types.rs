//! Wire types of the Home Assistant REST API.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use offpeak_domain::signal::SignalState;

/// Body of `GET /api/states/{entity_id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HaEntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: serde_json::Value,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl From<HaEntityState> for SignalState {
    fn from(value: HaEntityState) -> Self {
        let mut signal = SignalState::new(value.state).with_attributes(value.attributes);
        signal.last_updated = value.last_updated;
        signal
    }
}
