//! Websocket event feed.
//!
//! Every subscriber gets its own broadcast receiver; a slow client lags
//! and loses events rather than backpressuring the engine.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use krait_ports::EventReceiver;
use tracing::{debug, warn};

use crate::AppState;

pub async fn events(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let receiver = state.events.subscribe().await;
    ws.on_upgrade(move |socket| forward_events(socket, receiver))
}

async fn forward_events(mut socket: WebSocket, mut receiver: EventReceiver) {
    debug!("event stream subscriber connected");
    loop {
        tokio::select! {
            event = receiver.recv() => {
                let Some(event) = event else {
                    break; // bus closed, engine shutting down
                };
                let payload = match serde_json::to_string(&event) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(error = %e, "unserializable event dropped");
                        continue;
                    }
                };
                if socket.send(Message::Text(payload.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // feed is one-way, ignore client chatter
                    Some(Err(_)) => break,
                }
            }
        }
    }
    debug!("event stream subscriber disconnected");
}
