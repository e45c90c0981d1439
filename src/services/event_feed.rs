use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{domain::DomainEvent, state::SharedState};

/// Subscribe to the domain-events channel.
pub fn subscribe(state: &SharedState) -> broadcast::Receiver<DomainEvent> {
    state.events().subscribe()
}

/// Convert a bus subscription into an SSE response, forwarding each event as
/// its JSON envelope and cleaning up once the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<DomainEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads from the bus and pushes into the mpsc
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(event) => {
                            let sse_event = match serde_json::to_string(&event) {
                                Ok(data) => Event::default().event(event.kind.as_str()).data(data),
                                Err(err) => {
                                    warn!(error = %err, "failed to serialize domain event for the feed");
                                    continue;
                                }
                            };

                            if tx.send(Ok(sse_event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(_)) => {
                            // Skip lagged events but keep the stream alive.
                            continue;
                        }
                    }
                }
            }
        }

        info!("event feed stream disconnected");
    });

    // response stream reads from the mpsc; when the client disconnects axum
    // drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
