//! Server-Sent Events (SSE) stream of scheduler snapshots.

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use offpeak_app::ports::{Actuator, Clock, OptionsStore, StateReader};
use offpeak_app::scheduler::SchedulerSnapshot;

use crate::error::ApiError;
use crate::state::AppState;

fn to_event(snapshot: &SchedulerSnapshot) -> Option<Result<Event, std::convert::Infallible>> {
    match serde_json::to_string(snapshot) {
        Ok(json) => Some(Ok(Event::default().event("snapshot").data(json))),
        Err(err) => {
            tracing::warn!(%err, "failed to serialize snapshot for SSE stream");
            None
        }
    }
}

/// `GET /api/schedulers/{name}/stream`
///
/// Sends the current snapshot, then every snapshot the scheduler emits,
/// until the client disconnects.
pub async fn stream<R, A, C, St>(
    State(state): State<AppState<R, A, C, St>>,
    Path(name): Path<String>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>>, ApiError>
where
    R: StateReader + 'static,
    A: Actuator + 'static,
    C: Clock + 'static,
    St: OptionsStore + 'static,
{
    // Subscribe first so nothing emitted after the initial snapshot is missed.
    let rx = state.control.subscribe();
    let current = state.control.get(&name).await?;

    let updates = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(snapshot) if snapshot.name == name => to_event(&snapshot),
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(n)) => {
            tracing::warn!(skipped = n, "SSE subscriber lagged, some snapshots were dropped");
            None
        }
    });
    let initial = tokio_stream::iter(to_event(&current));

    Ok(Sse::new(initial.chain(updates)).keep_alive(KeepAlive::default()))
}
