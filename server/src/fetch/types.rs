//! Fetch types: response shape and error taxonomy.

use std::collections::BTreeMap;

use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::ErrorCode;
use crate::policy::PolicyError;

/// Response body as a finite, non-restartable sequence of chunks.
pub type BodyStream = BoxStream<'static, Result<Bytes, FetchError>>;

/// Status, headers, and a lazy body.
pub struct FetchResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    pub body: BodyStream,
}

impl std::fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by a [`super::Fetcher`].
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request was refused before reaching the network. Reported to the
    /// peer as an ordinary HTTP response with this status and JSON body.
    #[error("request rejected with status {status}")]
    Controlled { status: u16, body: serde_json::Value },

    /// The channel closed while the request was in flight.
    #[error("request cancelled")]
    Cancelled,

    /// TCP/TLS connection to the target failed.
    #[error("connection failed")]
    Connect(#[source] reqwest::Error),

    /// The configured request timeout elapsed.
    #[error("request timed out")]
    Timeout(#[source] reqwest::Error),

    /// Any other transport failure before headers arrived.
    #[error("request failed")]
    Request(#[source] reqwest::Error),

    /// Reading the response body failed after headers arrived.
    #[error("response body failed")]
    Body(#[source] reqwest::Error),

    /// Failure not attributable to the HTTP client.
    #[error("{0}")]
    Internal(String),
}

impl FetchError {
    /// Controlled failure with a `{code, message}` body.
    #[must_use]
    pub fn controlled(status: u16, code: &str, message: impl Into<String>) -> Self {
        Self::Controlled {
            status,
            body: serde_json::json!({ "code": code, "message": message.into() }),
        }
    }
}

impl From<PolicyError> for FetchError {
    fn from(err: PolicyError) -> Self {
        let status = match err {
            PolicyError::Blocked(_) => 403,
            PolicyError::InvalidUrl(_) | PolicyError::UnsupportedScheme(_) => 400,
        };
        Self::controlled(status, err.error_code(), err.to_string())
    }
}

impl ErrorCode for FetchError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Controlled { .. } => "E_CONTROLLED",
            Self::Cancelled => "E_CANCELLED",
            Self::Connect(_) => "E_CONNECT",
            Self::Timeout(_) => "E_TIMEOUT",
            Self::Request(_) => "E_REQUEST",
            Self::Body(_) => "E_BODY",
            Self::Internal(_) => "E_INTERNAL",
        }
    }
}
