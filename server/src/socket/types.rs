//! Socket types: the normalized event model for relayed WebSockets.

use bytes::Bytes;

use crate::error::ErrorCode;
use crate::policy::PolicyError;

/// Close code for a connection that ended without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;
/// Close code reported when the peer's close frame carried no code.
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Close code used when the relay tears a socket down after an internal fault.
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// A data message from the remote WebSocket, resolved once at the socket
/// boundary so nothing downstream branches on library-specific shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingMessage {
    Text(String),
    Binary(Bytes),
}

/// A data message to write to the remote WebSocket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingMessage {
    Text(String),
    Binary(Bytes),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
    pub was_clean: bool,
}

impl CloseInfo {
    /// Connection lost without a closing handshake.
    #[must_use]
    pub fn abnormal() -> Self {
        Self { code: CLOSE_ABNORMAL, reason: String::new(), was_clean: false }
    }
}

impl From<CloseInfo> for frames::WsClose {
    fn from(info: CloseInfo) -> Self {
        Self { code: info.code, reason: info.reason, was_clean: info.was_clean }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Message(IncomingMessage),
    /// Terminal. No further events follow.
    Closed(CloseInfo),
}

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("websocket connect failed")]
    Connect(#[source] Box<tokio_tungstenite::tungstenite::Error>),

    #[error("websocket connect timed out")]
    ConnectTimeout,

    #[error("invalid subprotocol list: {0}")]
    InvalidProtocols(String),

    #[error("websocket send failed")]
    Send(#[source] Box<tokio_tungstenite::tungstenite::Error>),

    /// The socket library produced a message shape this relay does not
    /// understand. Fatal for the bridge that observed it.
    #[error("unrecognized websocket message: {0}")]
    UnrecognizedMessage(&'static str),
}

impl ErrorCode for SocketError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Policy(e) => e.error_code(),
            Self::Connect(_) => "E_WS_CONNECT",
            Self::ConnectTimeout => "E_WS_CONNECT_TIMEOUT",
            Self::InvalidProtocols(_) => "E_WS_PROTOCOLS",
            Self::Send(_) => "E_WS_SEND",
            Self::UnrecognizedMessage(_) => "E_WS_UNRECOGNIZED",
        }
    }
}
