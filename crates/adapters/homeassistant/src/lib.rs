//! # offpeak-adapter-homeassistant
//!
//! Home Assistant integration over its REST API.
//!
//! ## Responsibilities
//! - Implement [`StateReader`] with `GET /api/states/{entity_id}`
//! - Implement [`Actuator`] with the `button.press` and `switch.turn_on` services
//! - Poll watched entities (door sensors) and publish their changes
//!
//! ## Dependency rule
//! Depends on `offpeak-app` (port traits) and `offpeak-domain` only.

pub mod client;
pub mod error;
pub mod poller;
pub mod types;

use std::future::Future;
use std::time::Duration;

use offpeak_app::ports::{Actuator, ActuatorError, StateReader};
use offpeak_domain::signal::SignalState;

pub use client::HomeAssistantClient;
pub use error::HaError;
pub use poller::{StatePoller, run_state_poller};

/// Connection settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// e.g. `http://homeassistant.local:8123`
    pub base_url: String,
    /// Long-lived access token.
    pub token: String,
    pub request_timeout: Duration,
}

impl Config {
    /// # Errors
    ///
    /// Returns [`HaError::Http`] when the HTTP client cannot be built.
    pub fn build(self) -> Result<HomeAssistant, HaError> {
        let client = HomeAssistantClient::new(self.base_url, self.token, self.request_timeout)?;
        tracing::info!(base_url = client.base_url(), "home assistant client ready");
        Ok(HomeAssistant { client })
    }
}

/// Port implementations backed by a Home Assistant instance.
#[derive(Debug, Clone)]
pub struct HomeAssistant {
    client: HomeAssistantClient,
}

impl HomeAssistant {
    #[must_use]
    pub fn new(client: HomeAssistantClient) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        "homeassistant"
    }

    async fn call(&self, domain: &str, service: &str, entity_id: &str) -> Result<(), ActuatorError> {
        self.client
            .call_service(domain, service, entity_id)
            .await
            .map_err(|err| {
                tracing::error!(entity_id, service, error = %err, "service call failed");
                err.into_actuator_error(entity_id)
            })
    }
}

impl StateReader for HomeAssistant {
    fn read(&self, entity_id: &str) -> impl Future<Output = Option<SignalState>> + Send {
        let entity_id = entity_id.to_string();
        async move {
            match self.client.get_state(&entity_id).await {
                Ok(state) => state.map(SignalState::from),
                Err(err) => {
                    tracing::warn!(%entity_id, error = %err, "failed to read state");
                    None
                }
            }
        }
    }
}

impl Actuator for HomeAssistant {
    fn press(&self, entity_id: &str) -> impl Future<Output = Result<(), ActuatorError>> + Send {
        let entity_id = entity_id.to_string();
        async move { self.call("button", "press", &entity_id).await }
    }

    fn turn_on(&self, entity_id: &str) -> impl Future<Output = Result<(), ActuatorError>> + Send {
        let entity_id = entity_id.to_string();
        async move { self.call("switch", "turn_on", &entity_id).await }
    }
}
