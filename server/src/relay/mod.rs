//! Relay: the multiplexing protocol engine.
//!
//! DESIGN
//! ======
//! One [`Relay`] serves one binary channel. Inbound bytes enter through
//! [`Relay::on_message`], are decoded into a typed [`ClientMessage`], and are
//! routed by operation:
//! - `HttpRequest` → a spawned HTTP exchange task (see [`http`])
//! - `WsOpen` → a spawned bridge task registered under the sequence id
//! - `WsSendText` / `WsSendBinary` / `WsClose` → the registered bridge
//!
//! Every outbound frame goes through one shared [`Outbound`] queue. Frames
//! for one sequence id keep their order; frames of different sequence ids
//! interleave freely.
//!
//! LIFECYCLE
//! =========
//! [`Relay::on_close`] fires the channel-closed token once, which cancels
//! all in-flight HTTP fetches. Registered bridges keep running unless
//! `close_sockets_on_disconnect` is set.
//!
//! ERROR HANDLING
//! ==============
//! Malformed frames, unknown operations, and commands for unregistered
//! sequence ids are dropped with a `debug` log. No inbound frame can fail
//! the dispatch loop.

pub mod http;
pub mod outbound;
mod registry;
mod websocket;

use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use outbound::Outbound;

use crate::fetch::Fetcher;
use crate::socket::{OutgoingMessage, SocketConnector};
use frames::{ClientMessage, Frame, WsOpen};
use registry::{Registry, SocketCommand};
use websocket::Bridge;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayOptions {
    /// Close every registered socket when the channel closes.
    pub close_sockets_on_disconnect: bool,
}

pub struct Relay {
    fetcher: Arc<dyn Fetcher>,
    connector: Arc<dyn SocketConnector>,
    outbound: Outbound,
    registry: Registry,
    closed: CancellationToken,
    options: RelayOptions,
}

impl Relay {
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        connector: Arc<dyn SocketConnector>,
        outbound: Outbound,
        options: RelayOptions,
    ) -> Self {
        Self { fetcher, connector, outbound, registry: Registry::default(), closed: CancellationToken::new(), options }
    }

    /// Decode and route one inbound frame.
    pub async fn on_message(&self, bytes: Bytes) {
        let Some(frame) = Frame::decode(bytes) else {
            debug!("relay: dropped short frame");
            return;
        };
        let sequence = frame.sequence;
        let Some(op) = frame.op() else {
            debug!(seq = sequence, op = frame.operation, "relay: ignoring unknown operation");
            return;
        };
        let Some(message) = ClientMessage::decode(op, frame.payload) else {
            debug!(seq = sequence, ?op, "relay: dropped malformed frame");
            return;
        };

        match message {
            ClientMessage::HttpRequest(request) => {
                let task = http::run_exchange(
                    sequence,
                    request,
                    Arc::clone(&self.fetcher),
                    self.outbound.clone(),
                    self.closed.child_token(),
                );
                tokio::spawn(task);
            }
            ClientMessage::WsOpen(open) => self.open_socket(sequence, open).await,
            ClientMessage::WsSendText(text) => {
                self.forward(sequence, SocketCommand::Send(OutgoingMessage::Text(text))).await;
            }
            ClientMessage::WsSendBinary(data) => {
                self.forward(sequence, SocketCommand::Send(OutgoingMessage::Binary(data))).await;
            }
            ClientMessage::WsClose => self.forward(sequence, SocketCommand::Close).await,
        }
    }

    /// Channel closed. Cancels in-flight HTTP exchanges; only the first call
    /// has any effect.
    pub async fn on_close(&self) {
        if self.closed.is_cancelled() {
            return;
        }
        self.closed.cancel();

        let sockets = self.registry.len().await;
        info!(sockets, close_sockets = self.options.close_sockets_on_disconnect, "relay: channel closed");
        if self.options.close_sockets_on_disconnect {
            self.registry.clear().await;
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Number of registered WebSocket bridges.
    pub async fn open_sockets(&self) -> usize {
        self.registry.len().await
    }

    async fn open_socket(&self, sequence: u16, open: WsOpen) {
        let Some(registration) = self.registry.register(sequence).await else {
            warn!(seq = sequence, url = %open.url, "relay: sequence already has a socket, open rejected");
            return;
        };
        let bridge = Bridge {
            sequence,
            generation: registration.generation,
            connector: Arc::clone(&self.connector),
            outbound: self.outbound.clone(),
            registry: self.registry.clone(),
            commands: registration.commands,
        };
        tokio::spawn(bridge.run(open));
    }

    async fn forward(&self, sequence: u16, command: SocketCommand) {
        if !self.registry.dispatch(sequence, command).await {
            debug!(seq = sequence, "relay: no socket for sequence");
        }
    }
}

#[cfg(test)]
pub(crate) mod test_helpers;

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
