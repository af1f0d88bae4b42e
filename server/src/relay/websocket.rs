//! WebSocket bridge: one sequence id bound to one outbound socket.
//!
//! LIFECYCLE
//! =========
//! 1. Registered under its sequence id before connecting; commands that
//!    arrive while connecting queue in the command channel.
//! 2. Connect succeeds → `WsOpen` ack. Connect fails → non-clean `WsClose`.
//! 3. Socket messages → `WsDataText` / `WsDataBinary`; commands → socket.
//! 4. Socket close event → `WsClose{code, reason, wasClean}`, then the
//!    bridge removes its own registration.
//!
//! A bridge also stops when the outbound channel is gone (nobody can read
//! its frames) and closes its socket when its command channel is dropped.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::outbound::Outbound;
use super::registry::{Registry, SocketCommand};
use crate::error::ErrorCode;
use crate::socket::types::CLOSE_INTERNAL_ERROR;
use crate::socket::{CloseInfo, IncomingMessage, RelaySocket, SocketConnector, SocketEvent};
use frames::{RelayMessage, WsOpen};

pub(crate) struct Bridge {
    pub sequence: u16,
    pub generation: u64,
    pub connector: Arc<dyn SocketConnector>,
    pub outbound: Outbound,
    pub registry: Registry,
    pub commands: mpsc::UnboundedReceiver<SocketCommand>,
}

impl Bridge {
    pub(crate) async fn run(mut self, open: WsOpen) {
        let sequence = self.sequence;
        if let Some(info) = self.relay(&open).await {
            info!(seq = sequence, code = info.code, clean = info.was_clean, "ws: closed");
            if let Err(e) = self.outbound.send(sequence, RelayMessage::WsClose(info.into())).await {
                debug!(seq = sequence, error = %e, "ws: close notification dropped");
            }
        }
        self.registry.remove(sequence, self.generation).await;
    }

    /// Connect and pump until the socket closes. Returns the close event to
    /// report, or `None` if the outbound channel is gone.
    async fn relay(&mut self, open: &WsOpen) -> Option<CloseInfo> {
        let sequence = self.sequence;
        let mut socket = match self.connector.connect(open).await {
            Ok(socket) => socket,
            Err(e) => {
                warn!(seq = sequence, url = %open.url, code = e.error_code(), error = %e, "ws: connect failed");
                return Some(CloseInfo::abnormal());
            }
        };

        info!(seq = sequence, url = %open.url, "ws: open");
        if self.outbound.send(sequence, RelayMessage::WsOpen).await.is_err() {
            shutdown(sequence, &mut socket).await;
            return None;
        }

        let mut commands_open = true;
        loop {
            tokio::select! {
                event = socket.next_event() => match event {
                    Ok(SocketEvent::Message(message)) => {
                        let frame = match message {
                            IncomingMessage::Text(text) => RelayMessage::WsDataText(text),
                            IncomingMessage::Binary(data) => RelayMessage::WsDataBinary(data),
                        };
                        if self.outbound.send(sequence, frame).await.is_err() {
                            shutdown(sequence, &mut socket).await;
                            return None;
                        }
                    }
                    Ok(SocketEvent::Closed(info)) => return Some(info),
                    Err(e) => {
                        error!(seq = sequence, code = e.error_code(), error = %e, "ws: fatal socket error");
                        shutdown(sequence, &mut socket).await;
                        return Some(CloseInfo {
                            code: CLOSE_INTERNAL_ERROR,
                            reason: "unsupported message".to_owned(),
                            was_clean: false,
                        });
                    }
                },
                command = self.commands.recv(), if commands_open => match command {
                    Some(SocketCommand::Send(message)) => {
                        if let Err(e) = socket.send(message).await {
                            debug!(seq = sequence, error = %e, "ws: send failed");
                        }
                    }
                    Some(SocketCommand::Close) => {
                        debug!(seq = sequence, "ws: close requested");
                        if let Err(e) = socket.close().await {
                            debug!(seq = sequence, error = %e, "ws: close failed");
                        }
                    }
                    None => {
                        commands_open = false;
                        debug!(seq = sequence, "ws: deregistered, closing socket");
                        if let Err(e) = socket.close().await {
                            debug!(seq = sequence, error = %e, "ws: close failed");
                        }
                    }
                },
            }
        }
    }
}

async fn shutdown(sequence: u16, socket: &mut Box<dyn RelaySocket>) {
    if let Err(e) = socket.close().await {
        debug!(seq = sequence, error = %e, "ws: close failed");
    }
}

#[cfg(test)]
#[path = "websocket_test.rs"]
mod tests;
