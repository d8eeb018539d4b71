//! JSON API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod log;
#[allow(clippy::missing_errors_doc)]
pub mod schedulers;
#[allow(clippy::missing_errors_doc)]
pub mod sse;

use axum::Router;
use axum::routing::{get, patch, post, put};

use offpeak_app::ports::{Actuator, Clock, OptionsStore, StateReader};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<R, A, C, St>() -> Router<AppState<R, A, C, St>>
where
    R: StateReader + 'static,
    A: Actuator + 'static,
    C: Clock + 'static,
    St: OptionsStore + 'static,
{
    Router::new()
        .route("/schedulers", get(schedulers::list::<R, A, C, St>))
        .route("/schedulers/{name}", get(schedulers::get::<R, A, C, St>))
        .route(
            "/schedulers/{name}/armed",
            put(schedulers::set_armed::<R, A, C, St>),
        )
        .route(
            "/schedulers/{name}/recompute",
            post(schedulers::recompute::<R, A, C, St>),
        )
        .route(
            "/schedulers/{name}/schedule-from-prices",
            post(schedulers::schedule_from_prices::<R, A, C, St>),
        )
        .route(
            "/schedulers/{name}/options",
            patch(schedulers::update_option::<R, A, C, St>),
        )
        .route("/schedulers/{name}/stream", get(sse::stream::<R, A, C, St>))
        .route("/log", post(log::write))
}
