//! Typed payload schema, one variant per operation code.
//!
//! DESIGN
//! ======
//! Payloads are validated once, at decode time, into [`ClientMessage`] or
//! [`RelayMessage`]. Handlers never look at raw JSON. A payload that does not
//! match its operation's schema decodes to `None` and is treated as a
//! malformed frame.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{CodecError, Operation, decode_json_payload, encode, encode_empty, encode_json};

// =============================================================================
// CLIENT → RELAY
// =============================================================================

/// Request description carried by an `HttpRequest` frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: String,
    /// Absolute target URL.
    pub remote: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<RequestBody>,
}

/// Request body descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum RequestBody {
    /// UTF-8 text sent as-is.
    Text(String),
    /// Arbitrary bytes, standard base64 with padding.
    Base64(String),
}

impl RequestBody {
    /// Raw body bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Base64`] when a `base64` body is not valid base64.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        match self {
            Self::Text(text) => Ok(text.as_bytes().to_vec()),
            Self::Base64(data) => Ok(STANDARD.decode(data)?),
        }
    }

    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::Text(text.to_owned()),
            Err(_) => Self::Base64(STANDARD.encode(bytes)),
        }
    }
}

/// Target of a `WsOpen` request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsOpen {
    pub url: String,
    /// Requested `Sec-WebSocket-Protocol` values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<String>,
}

/// A decoded client→relay frame payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientMessage {
    HttpRequest(HttpRequest),
    WsOpen(WsOpen),
    WsSendText(String),
    WsSendBinary(Bytes),
    WsClose,
}

impl ClientMessage {
    /// Validate `payload` against the schema for `operation`.
    ///
    /// Returns `None` for relay→client operations, schema mismatches,
    /// undecodable `base64` bodies, and non-UTF-8 text.
    #[must_use]
    pub fn decode(operation: Operation, payload: Bytes) -> Option<Self> {
        match operation {
            Operation::HttpRequest => {
                let request: HttpRequest = decode_json_payload(&payload)?;
                if let Some(body) = &request.body {
                    body.to_bytes().ok()?;
                }
                Some(Self::HttpRequest(request))
            }
            Operation::WsOpen => decode_json_payload(&payload).map(Self::WsOpen),
            Operation::WsSendText => String::from_utf8(payload.to_vec()).ok().map(Self::WsSendText),
            Operation::WsSendBinary => Some(Self::WsSendBinary(payload)),
            Operation::WsClose => Some(Self::WsClose),
            Operation::HttpResponseStart
            | Operation::HttpResponseChunk
            | Operation::HttpResponseEnd
            | Operation::WsDataText
            | Operation::WsDataBinary => None,
        }
    }

    /// Encode as a frame on `sequence`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Json`] if a JSON payload fails to serialize.
    pub fn encode(&self, sequence: u16) -> Result<Vec<u8>, CodecError> {
        match self {
            Self::HttpRequest(request) => encode_json(sequence, Operation::HttpRequest, request),
            Self::WsOpen(open) => encode_json(sequence, Operation::WsOpen, open),
            Self::WsSendText(text) => Ok(encode(sequence, Operation::WsSendText, text.as_bytes())),
            Self::WsSendBinary(data) => Ok(encode(sequence, Operation::WsSendBinary, data)),
            Self::WsClose => Ok(encode_empty(sequence, Operation::WsClose)),
        }
    }
}

// =============================================================================
// RELAY → CLIENT
// =============================================================================

/// Status line and headers of a relayed HTTP response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponseStart {
    pub status: u16,
    #[serde(rename = "statusText")]
    pub status_text: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Close notification for a relayed WebSocket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsClose {
    pub code: u16,
    pub reason: String,
    #[serde(rename = "wasClean")]
    pub was_clean: bool,
}

/// A relay→client frame payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayMessage {
    HttpResponseStart(HttpResponseStart),
    HttpResponseChunk(Bytes),
    HttpResponseEnd,
    WsOpen,
    WsClose(WsClose),
    WsDataText(String),
    WsDataBinary(Bytes),
}

impl RelayMessage {
    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            Self::HttpResponseStart(_) => Operation::HttpResponseStart,
            Self::HttpResponseChunk(_) => Operation::HttpResponseChunk,
            Self::HttpResponseEnd => Operation::HttpResponseEnd,
            Self::WsOpen => Operation::WsOpen,
            Self::WsClose(_) => Operation::WsClose,
            Self::WsDataText(_) => Operation::WsDataText,
            Self::WsDataBinary(_) => Operation::WsDataBinary,
        }
    }

    /// Encode as a frame on `sequence`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Json`] if a JSON payload fails to serialize.
    pub fn encode(&self, sequence: u16) -> Result<Vec<u8>, CodecError> {
        let op = self.operation();
        match self {
            Self::HttpResponseStart(start) => encode_json(sequence, op, start),
            Self::WsClose(close) => encode_json(sequence, op, close),
            Self::HttpResponseChunk(data) | Self::WsDataBinary(data) => Ok(encode(sequence, op, data)),
            Self::WsDataText(text) => Ok(encode(sequence, op, text.as_bytes())),
            Self::HttpResponseEnd | Self::WsOpen => Ok(encode_empty(sequence, op)),
        }
    }

    /// Peer-side decode of a relay frame.
    #[must_use]
    pub fn decode(operation: Operation, payload: Bytes) -> Option<Self> {
        match operation {
            Operation::HttpResponseStart => decode_json_payload(&payload).map(Self::HttpResponseStart),
            Operation::HttpResponseChunk => Some(Self::HttpResponseChunk(payload)),
            Operation::HttpResponseEnd => Some(Self::HttpResponseEnd),
            Operation::WsOpen => Some(Self::WsOpen),
            Operation::WsClose => decode_json_payload(&payload).map(Self::WsClose),
            Operation::WsDataText => String::from_utf8(payload.to_vec()).ok().map(Self::WsDataText),
            Operation::WsDataBinary => Some(Self::WsDataBinary(payload)),
            Operation::HttpRequest | Operation::WsSendText | Operation::WsSendBinary => None,
        }
    }
}

#[cfg(test)]
#[path = "payload_test.rs"]
mod tests;
