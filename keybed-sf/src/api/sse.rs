//! Server-Sent Events for compare and catalog changes

use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::AppState;

/// GET /api/events
///
/// Streams `CompareSetChanged` (clients replace their current history entry
/// with the event's `route`) and `InstrumentChanged`, plus a heartbeat.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    keybed_common::sse::create_event_sse_stream("keybed-sf", state.events.subscribe())
}
