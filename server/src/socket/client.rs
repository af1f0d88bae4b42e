//! tokio-tungstenite-backed [`SocketConnector`].

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use super::types::{CLOSE_NO_STATUS, CloseInfo, IncomingMessage, OutgoingMessage, SocketError, SocketEvent};
use super::{RelaySocket, SocketConnector};
use crate::policy::HostPolicy;
use frames::WsOpen;

pub struct TungsteniteConnector {
    policy: HostPolicy,
    connect_timeout: Duration,
}

impl TungsteniteConnector {
    #[must_use]
    pub fn new(policy: HostPolicy, connect_timeout: Duration) -> Self {
        Self { policy, connect_timeout }
    }
}

#[async_trait::async_trait]
impl SocketConnector for TungsteniteConnector {
    async fn connect(&self, open: &WsOpen) -> Result<Box<dyn RelaySocket>, SocketError> {
        let url = self.policy.check_url(&open.url, &["ws", "wss"])?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| SocketError::Connect(Box::new(e)))?;
        if !open.protocols.is_empty() {
            let joined = open.protocols.join(", ");
            let value = HeaderValue::from_str(&joined).map_err(|_| SocketError::InvalidProtocols(joined.clone()))?;
            request.headers_mut().insert("sec-websocket-protocol", value);
        }

        let (stream, response) = tokio::time::timeout(self.connect_timeout, connect_async(request))
            .await
            .map_err(|_| SocketError::ConnectTimeout)?
            .map_err(|e| SocketError::Connect(Box::new(e)))?;
        debug!(url = %url, status = response.status().as_u16(), "socket: handshake complete");

        Ok(Box::new(TungsteniteSocket { stream }))
    }
}

struct TungsteniteSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait::async_trait]
impl RelaySocket for TungsteniteSocket {
    async fn next_event(&mut self) -> Result<SocketEvent, SocketError> {
        loop {
            match self.stream.next().await {
                Some(Ok(message)) => {
                    if let Some(event) = normalize(message)? {
                        return Ok(event);
                    }
                }
                Some(Err(e)) => {
                    debug!(error = %e, "socket: read failed");
                    return Ok(SocketEvent::Closed(CloseInfo::abnormal()));
                }
                None => return Ok(SocketEvent::Closed(CloseInfo::abnormal())),
            }
        }
    }

    async fn send(&mut self, message: OutgoingMessage) -> Result<(), SocketError> {
        let message = match message {
            OutgoingMessage::Text(text) => Message::Text(text.into()),
            OutgoingMessage::Binary(data) => Message::Binary(data),
        };
        self.stream
            .send(message)
            .await
            .map_err(|e| SocketError::Send(Box::new(e)))
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.stream
            .close(None)
            .await
            .map_err(|e| SocketError::Send(Box::new(e)))
    }
}

/// Map one library message onto the relay's event model.
///
/// Control frames the library answers itself (ping/pong) yield `None`.
fn normalize(message: Message) -> Result<Option<SocketEvent>, SocketError> {
    match message {
        Message::Text(text) => Ok(Some(SocketEvent::Message(IncomingMessage::Text(text.as_str().to_owned())))),
        Message::Binary(data) => Ok(Some(SocketEvent::Message(IncomingMessage::Binary(data)))),
        Message::Ping(_) | Message::Pong(_) => Ok(None),
        Message::Close(frame) => {
            let info = match frame {
                Some(frame) => CloseInfo { code: frame.code.into(), reason: frame.reason.as_str().to_owned(), was_clean: true },
                None => CloseInfo { code: CLOSE_NO_STATUS, reason: String::new(), was_clean: true },
            };
            Ok(Some(SocketEvent::Closed(info)))
        }
        Message::Frame(_) => Err(SocketError::UnrecognizedMessage("raw frame")),
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
