//! Home Assistant REST API client.

use std::time::Duration;

use reqwest::{Client, StatusCode};

use crate::error::HaError;
use crate::types::HaEntityState;

/// Thin client over the endpoints the schedulers need.
#[derive(Debug, Clone)]
pub struct HomeAssistantClient {
    base_url: String,
    token: String,
    client: Client,
}

impl HomeAssistantClient {
    /// # Errors
    ///
    /// Returns [`HaError::Http`] when the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, HaError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current state of `entity_id`, `None` when Home Assistant does not know it.
    ///
    /// # Errors
    ///
    /// - [`HaError::Unauthorized`] when the token is refused
    /// - [`HaError::Api`] for any other unexpected status
    /// - [`HaError::Http`] when the request fails
    pub async fn get_state(&self, entity_id: &str) -> Result<Option<HaEntityState>, HaError> {
        let url = format!("{}/api/states/{entity_id}", self.base_url);
        tracing::trace!(%url, "fetching state");
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(Some(response.json::<HaEntityState>().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(HaError::Unauthorized),
            status => Err(HaError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Call `domain.service` targeting `entity_id`.
    ///
    /// # Errors
    ///
    /// Same as [`get_state`](Self::get_state), a missing entity being an
    /// [`HaError::Api`].
    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        entity_id: &str,
    ) -> Result<(), HaError> {
        let url = format!("{}/api/services/{domain}/{service}", self.base_url);
        tracing::debug!(%url, entity_id, "calling service");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "entity_id": entity_id }))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(HaError::Unauthorized),
            status => Err(HaError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }
}
