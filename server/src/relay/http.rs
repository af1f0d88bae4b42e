//! HTTP exchange: one request relayed as `start → chunk* → end`.
//!
//! DESIGN
//! ======
//! Each exchange runs in its own task with a child of the relay's
//! channel-closed token. The child is dropped when the task ends, which
//! detaches it from the parent, so long-lived channels do not accumulate
//! hooks from finished requests.
//!
//! ERROR HANDLING
//! ==============
//! - Controlled fetch failure → synthetic response with that status.
//! - Any other fetch failure → synthetic 500 with a generic error body.
//! - Cancellation → nothing further is sent for the sequence.
//! - Body failure after the start frame → logged, then `HttpResponseEnd`.
//!
//! Synthetic responses carry no chunk frames. Their JSON error body travels
//! in the `x-relay-error` response header.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::StreamExt;
use reqwest::StatusCode;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::outbound::{Outbound, OutboundError};
use crate::error::ErrorCode;
use crate::fetch::{FetchError, FetchResponse, Fetcher};
use frames::{HttpRequest, HttpResponseStart, RelayMessage};

/// Response header carrying the JSON body of a synthetic error response.
pub const RELAY_ERROR_HEADER: &str = "x-relay-error";

/// Generic code for uncontrolled faults.
pub const INTERNAL_ERROR_CODE: &str = "INTERNAL_ERROR";

/// Drive one request through `fetcher` and stream the result to `outbound`.
pub(crate) async fn run_exchange(
    sequence: u16,
    request: HttpRequest,
    fetcher: Arc<dyn Fetcher>,
    outbound: Outbound,
    cancel: CancellationToken,
) {
    info!(seq = sequence, method = %request.method, remote = %request.remote, "http: exchange start");

    let result = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            debug!(seq = sequence, "http: cancelled before response");
            return;
        }
        result = fetcher.fetch(request, cancel.clone()) => result,
    };

    let sent = match result {
        Ok(response) => stream_response(sequence, response, &outbound, &cancel).await,
        Err(FetchError::Cancelled) => {
            debug!(seq = sequence, "http: fetch cancelled");
            return;
        }
        Err(FetchError::Controlled { status, body }) => {
            info!(seq = sequence, status, "http: request rejected");
            send_synthetic(sequence, status, &body, &outbound).await
        }
        Err(err) => {
            warn!(seq = sequence, code = err.error_code(), error = %err, "http: fetch failed");
            send_synthetic(sequence, 500, &fault_body(&err), &outbound).await
        }
    };

    match sent {
        Ok(()) => debug!(seq = sequence, "http: exchange complete"),
        Err(e) => debug!(seq = sequence, error = %e, "http: exchange abandoned"),
    }
}

async fn stream_response(
    sequence: u16,
    response: FetchResponse,
    outbound: &Outbound,
    cancel: &CancellationToken,
) -> Result<(), OutboundError> {
    let FetchResponse { status, status_text, headers, mut body } = response;
    info!(seq = sequence, status, "http: response start");
    outbound
        .send(sequence, RelayMessage::HttpResponseStart(HttpResponseStart { status, status_text, headers }))
        .await?;

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(seq = sequence, "http: cancelled mid-body");
                return Ok(());
            }
            next = body.next() => next,
        };
        match next {
            Some(Ok(chunk)) => outbound.send(sequence, RelayMessage::HttpResponseChunk(chunk)).await?,
            Some(Err(FetchError::Cancelled)) => return Ok(()),
            Some(Err(e)) => {
                warn!(seq = sequence, code = e.error_code(), error = %e, "http: body stream failed");
                break;
            }
            None => break,
        }
    }

    outbound.send(sequence, RelayMessage::HttpResponseEnd).await
}

async fn send_synthetic(sequence: u16, status: u16, body: &Value, outbound: &Outbound) -> Result<(), OutboundError> {
    let start = synthetic_start(status, body);
    outbound.send(sequence, RelayMessage::HttpResponseStart(start)).await?;
    outbound.send(sequence, RelayMessage::HttpResponseEnd).await
}

fn synthetic_start(status: u16, body: &Value) -> HttpResponseStart {
    let status_text = StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or_default()
        .to_owned();
    let mut headers = BTreeMap::new();
    headers.insert("content-type".to_owned(), "application/json".to_owned());
    headers.insert(RELAY_ERROR_HEADER.to_owned(), body.to_string());
    HttpResponseStart { status, status_text, headers }
}

/// Body for an uncontrolled fault.
pub(crate) fn fault_body(err: &FetchError) -> Value {
    let mut body = serde_json::json!({
        "code": INTERNAL_ERROR_CODE,
        "id": err.error_code(),
        "message": err.to_string(),
    });
    if let Some(trace) = err.trace() {
        body["trace"] = Value::String(trace);
    }
    body
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
