use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{services::event_feed, state::SharedState};

#[utoipa::path(
    get,
    path = "/events/stream",
    tag = "events",
    responses((status = 200, description = "Domain event feed", content_type = "text/event-stream", body = String))
)]
/// Stream every domain event to external consumers as JSON envelopes.
pub async fn event_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let receiver = event_feed::subscribe(&state);
    info!("new event feed connection");
    event_feed::to_sse_stream(receiver)
}

/// Configure the event feed endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/events/stream", get(event_stream))
}
