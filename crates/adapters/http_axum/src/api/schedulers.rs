//! JSON handlers for schedulers.

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use offpeak_app::ports::{Actuator, Clock, OptionsStore, StateReader};
use offpeak_app::scheduler::{PriceScheduleRequest, SchedulerSnapshot};
use offpeak_domain::options::OptionUpdate;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for arming or disarming.
#[derive(Debug, Deserialize)]
pub struct SetArmedRequest {
    pub armed: bool,
}

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<SchedulerSnapshot>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Response of every endpoint acting on a single scheduler.
pub enum SnapshotResponse {
    Ok(Json<SchedulerSnapshot>),
}

impl IntoResponse for SnapshotResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

impl From<SchedulerSnapshot> for SnapshotResponse {
    fn from(snapshot: SchedulerSnapshot) -> Self {
        Self::Ok(Json(snapshot))
    }
}

/// `GET /api/schedulers`
pub async fn list<R, A, C, St>(State(state): State<AppState<R, A, C, St>>) -> ListResponse
where
    R: StateReader + 'static,
    A: Actuator + 'static,
    C: Clock + 'static,
    St: OptionsStore + 'static,
{
    ListResponse::Ok(Json(state.control.list().await))
}

/// `GET /api/schedulers/{name}`
pub async fn get<R, A, C, St>(
    State(state): State<AppState<R, A, C, St>>,
    Path(name): Path<String>,
) -> Result<SnapshotResponse, ApiError>
where
    R: StateReader + 'static,
    A: Actuator + 'static,
    C: Clock + 'static,
    St: OptionsStore + 'static,
{
    Ok(state.control.get(&name).await?.into())
}

/// `PUT /api/schedulers/{name}/armed`
pub async fn set_armed<R, A, C, St>(
    State(state): State<AppState<R, A, C, St>>,
    Path(name): Path<String>,
    Json(body): Json<SetArmedRequest>,
) -> Result<SnapshotResponse, ApiError>
where
    R: StateReader + 'static,
    A: Actuator + 'static,
    C: Clock + 'static,
    St: OptionsStore + 'static,
{
    Ok(state.control.set_armed(&name, body.armed).await?.into())
}

/// `POST /api/schedulers/{name}/recompute`
pub async fn recompute<R, A, C, St>(
    State(state): State<AppState<R, A, C, St>>,
    Path(name): Path<String>,
) -> Result<SnapshotResponse, ApiError>
where
    R: StateReader + 'static,
    A: Actuator + 'static,
    C: Clock + 'static,
    St: OptionsStore + 'static,
{
    Ok(state.control.recompute(&name).await?.into())
}

/// `POST /api/schedulers/{name}/schedule-from-prices`
///
/// A failed search is not an error: the returned snapshot has no plan.
pub async fn schedule_from_prices<R, A, C, St>(
    State(state): State<AppState<R, A, C, St>>,
    Path(name): Path<String>,
    Json(body): Json<PriceScheduleRequest>,
) -> Result<SnapshotResponse, ApiError>
where
    R: StateReader + 'static,
    A: Actuator + 'static,
    C: Clock + 'static,
    St: OptionsStore + 'static,
{
    Ok(state.control.schedule_from_prices(&name, body).await?.into())
}

/// `PATCH /api/schedulers/{name}/options` with `{"key": ..., "value": ...}`
pub async fn update_option<R, A, C, St>(
    State(state): State<AppState<R, A, C, St>>,
    Path(name): Path<String>,
    Json(body): Json<OptionUpdate>,
) -> Result<SnapshotResponse, ApiError>
where
    R: StateReader + 'static,
    A: Actuator + 'static,
    C: Clock + 'static,
    St: OptionsStore + 'static,
{
    Ok(state.control.update_option(&name, body).await?.into())
}
