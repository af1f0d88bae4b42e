//! Socket: the outbound WebSocket collaborator.
//!
//! DESIGN
//! ======
//! The bridge drives a socket through two traits. [`SocketConnector`] opens
//! a connection; [`RelaySocket`] exposes the socket's events as a pull-based
//! `next_event` plus `send` and `close`. The library's open event is the
//! successful return of `connect`, its message and close events are
//! [`SocketEvent`] values.

pub mod client;
pub mod types;

pub use client::TungsteniteConnector;
pub use types::{CloseInfo, IncomingMessage, OutgoingMessage, SocketError, SocketEvent};

use frames::WsOpen;

/// Opens outbound WebSocket connections.
#[async_trait::async_trait]
pub trait SocketConnector: Send + Sync {
    /// Connect to `open.url`, resolving once the handshake completes.
    async fn connect(&self, open: &WsOpen) -> Result<Box<dyn RelaySocket>, SocketError>;
}

/// One live WebSocket connection.
#[async_trait::async_trait]
pub trait RelaySocket: Send {
    /// Wait for the next message or the close event.
    ///
    /// Transport failures surface as a non-clean [`SocketEvent::Closed`].
    /// An `Err` means the socket produced something that cannot be relayed.
    async fn next_event(&mut self) -> Result<SocketEvent, SocketError>;

    async fn send(&mut self, message: OutgoingMessage) -> Result<(), SocketError>;

    /// Start the closing handshake with no code or reason. The resulting
    /// close event still arrives through [`RelaySocket::next_event`].
    async fn close(&mut self) -> Result<(), SocketError>;
}
