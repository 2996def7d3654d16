//! Server-sent event stream of project changes.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::{error::RecvError, Receiver};

use solarflow_core::lifecycle::ProjectEvent;

use crate::AppState;

const HEARTBEAT: Duration = Duration::from_secs(15);

/// SSE endpoint for project events with heartbeat
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(event_stream(state.events.subscribe())).keep_alive(KeepAlive::default())
}

/// Forward broadcast events as SSE frames, with a heartbeat comment after
/// every quiet interval. Ends when the channel closes.
fn event_stream(rx: Receiver<ProjectEvent>) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(rx, |mut rx| async move {
        let frame = match tokio::time::timeout(HEARTBEAT, rx.recv()).await {
            Ok(Ok(event)) => {
                let json = serde_json::to_string(&event).unwrap_or_default();
                Event::default().id(event.id.clone()).data(json)
            }
            Ok(Err(RecvError::Lagged(skipped))) => {
                tracing::warn!(skipped, "SSE subscriber lagged");
                Event::default().comment(format!("lagged {}", skipped))
            }
            Ok(Err(RecvError::Closed)) => return None,
            Err(_) => Event::default().comment("heartbeat"),
        };
        Some((Ok(frame), rx))
    })
}
