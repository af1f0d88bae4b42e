//! Relay channel transport.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → build a fresh [`Relay`] and its outbound frame queue
//! 2. Binary messages → `Relay::on_message`; queued frames → binary messages
//! 3. Close, transport error, or a failed write → `Relay::on_close`
//!
//! Text messages are not part of the protocol and are ignored.

use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tracing::{debug, info};

use crate::relay::Relay;
use crate::state::AppState;

pub async fn handle_relay(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_channel(socket, state))
}

async fn run_channel(mut socket: WebSocket, state: AppState) {
    let (relay, mut frames) = state.new_relay();
    let channels = state.channels.fetch_add(1, Ordering::Relaxed) + 1;
    info!(channels, "relay channel: connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Binary(bytes) => relay.on_message(bytes).await,
                    Message::Text(_) => debug!("relay channel: ignoring text message"),
                    Message::Close(_) => break,
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
            Some(frame) = frames.recv() => {
                if socket.send(Message::Binary(frame.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    shutdown(&relay).await;
    let channels = state.channels.fetch_sub(1, Ordering::Relaxed) - 1;
    info!(channels, "relay channel: disconnected");
}

async fn shutdown(relay: &Relay) {
    relay.on_close().await;
    let sockets = relay.open_sockets().await;
    debug!(sockets, "relay channel: sockets still registered");
}

#[cfg(test)]
#[path = "relay_test.rs"]
mod tests;
