//! Shared frame model and binary codec for the relay channel.
//!
//! This crate owns the wire representation used by both `relay-server` and
//! `relay-cli`. A frame is a fixed 3-byte header followed by an
//! operation-specific payload:
//!
//! ```text
//! sequence: u16 (big-endian) | operation: u8 | payload: bytes
//! ```
//!
//! Decoding never fails loudly: anything that cannot be read is reported as
//! `None` and the caller drops it. Typed payload schemas live in [`payload`].

pub mod payload;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use payload::{
    ClientMessage, HttpRequest, HttpResponseStart, RelayMessage, RequestBody, WsClose, WsOpen,
};

/// Bytes occupied by `sequence` + `operation`.
pub const HEADER_LEN: usize = 3;

/// Error returned by the encoding helpers.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A JSON payload could not be serialized.
    #[error("failed to encode json payload: {0}")]
    Json(#[from] serde_json::Error),
    /// A `base64` request body did not decode.
    #[error("invalid base64 body: {0}")]
    Base64(#[from] base64::DecodeError),
}

// =============================================================================
// OPERATION
// =============================================================================

/// Operation codes carried in the third header byte.
///
/// `WsOpen` and `WsClose` are shared by both directions: client→relay they
/// are requests, relay→client they are the acknowledgement and the close
/// notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operation {
    HttpRequest = 0,
    HttpResponseStart = 1,
    HttpResponseChunk = 2,
    HttpResponseEnd = 3,
    WsOpen = 4,
    WsClose = 5,
    WsSendText = 6,
    WsSendBinary = 7,
    WsDataText = 8,
    WsDataBinary = 9,
}

impl Operation {
    /// Wire value of this operation.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a wire value. Unknown codes return `None` so newer peers can
    /// send operations this build does not implement.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::HttpRequest),
            1 => Some(Self::HttpResponseStart),
            2 => Some(Self::HttpResponseChunk),
            3 => Some(Self::HttpResponseEnd),
            4 => Some(Self::WsOpen),
            5 => Some(Self::WsClose),
            6 => Some(Self::WsSendText),
            7 => Some(Self::WsSendBinary),
            8 => Some(Self::WsDataText),
            9 => Some(Self::WsDataBinary),
            _ => None,
        }
    }
}

// =============================================================================
// HEADER + FRAME
// =============================================================================

/// Decoded frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    /// Peer-chosen exchange identifier.
    pub sequence: u16,
    /// Raw operation code; see [`Operation::from_u8`].
    pub operation: u8,
    /// Index of the first payload byte.
    pub payload_offset: usize,
}

/// A single message on the relay channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub sequence: u16,
    pub operation: u8,
    pub payload: Bytes,
}

impl Frame {
    #[must_use]
    pub fn new(sequence: u16, operation: Operation, payload: impl Into<Bytes>) -> Self {
        Self { sequence, operation: operation.as_u8(), payload: payload.into() }
    }

    /// Split raw bytes into header fields and payload without copying.
    #[must_use]
    pub fn decode(bytes: Bytes) -> Option<Self> {
        let header = decode_header(&bytes)?;
        Some(Self {
            sequence: header.sequence,
            operation: header.operation,
            payload: bytes.slice(header.payload_offset..),
        })
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        encode_raw(self.sequence, self.operation, &self.payload)
    }

    /// Typed operation, or `None` for codes this build does not know.
    #[must_use]
    pub fn op(&self) -> Option<Operation> {
        Operation::from_u8(self.operation)
    }
}

/// Read the sequence and operation from the front of `bytes`.
///
/// Returns `None` when the buffer is shorter than [`HEADER_LEN`].
#[must_use]
pub fn decode_header(bytes: &[u8]) -> Option<Header> {
    let [hi, lo, operation, ..] = *bytes else {
        return None;
    };
    Some(Header { sequence: u16::from_be_bytes([hi, lo]), operation, payload_offset: HEADER_LEN })
}

/// UTF-8 decode then JSON parse a payload. Any failure yields `None`.
#[must_use]
pub fn decode_json_payload<T: DeserializeOwned>(payload: &[u8]) -> Option<T> {
    let text = std::str::from_utf8(payload).ok()?;
    serde_json::from_str(text).ok()
}

/// Encode `sequence ‖ operation ‖ payload`.
#[must_use]
pub fn encode(sequence: u16, operation: Operation, payload: &[u8]) -> Vec<u8> {
    encode_raw(sequence, operation.as_u8(), payload)
}

/// Encode a JSON payload frame.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if `value` cannot be serialized.
pub fn encode_json<T: Serialize>(sequence: u16, operation: Operation, value: &T) -> Result<Vec<u8>, CodecError> {
    let payload = serde_json::to_vec(value)?;
    Ok(encode(sequence, operation, &payload))
}

/// Header-only frame, used for acknowledgements and end markers.
#[must_use]
pub fn encode_empty(sequence: u16, operation: Operation) -> Vec<u8> {
    encode(sequence, operation, &[])
}

fn encode_raw(sequence: u16, operation: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&sequence.to_be_bytes());
    out.push(operation);
    out.extend_from_slice(payload);
    out
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
