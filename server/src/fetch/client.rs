//! reqwest-backed [`Fetcher`].

use std::collections::BTreeMap;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, redirect};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Fetcher;
use super::types::{FetchError, FetchResponse};
use crate::policy::HostPolicy;
use frames::HttpRequest;

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Request headers the relay owns; peer-supplied values are dropped.
const HOP_BY_HOP_HEADERS: &[&str] =
    &["host", "connection", "content-length", "transfer-encoding", "upgrade", "keep-alive"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    pub connect_timeout: Duration,
    /// Whole-request deadline. `None` lets slow bodies stream indefinitely.
    pub request_timeout: Option<Duration>,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: None,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

pub struct ReqwestFetcher {
    http: reqwest::Client,
    policy: HostPolicy,
}

impl ReqwestFetcher {
    /// Build a fetcher. Redirects are followed up to `max_redirects` and are
    /// re-checked against `policy` at every hop.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Internal`] if the HTTP client fails to build.
    pub fn new(config: FetchConfig, policy: HostPolicy) -> Result<Self, FetchError> {
        let redirect_policy = {
            let policy = policy.clone();
            let max = config.max_redirects;
            redirect::Policy::custom(move |attempt| {
                if attempt.previous().len() > max {
                    attempt.error("too many redirects")
                } else if attempt.url().host_str().is_some_and(|h| policy.is_blocked(h)) {
                    attempt.stop()
                } else {
                    attempt.follow()
                }
            })
        };

        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .redirect(redirect_policy);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| FetchError::Internal(format!("http client build failed: {e}")))?;

        Ok(Self { http, policy })
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, request: HttpRequest, cancel: CancellationToken) -> Result<FetchResponse, FetchError> {
        let url = self.policy.check_url(&request.remote, &["http", "https"])?;
        let method = parse_method(&request.method)?;
        let headers = build_headers(&request.headers)?;

        let mut builder = self.http.request(method, url).headers(headers);
        if let Some(body) = &request.body {
            let bytes = body
                .to_bytes()
                .map_err(|e| FetchError::controlled(400, "INVALID_BODY", e.to_string()))?;
            builder = builder.body(bytes);
        }

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(FetchError::Cancelled),
            result = builder.send() => result.map_err(classify)?,
        };

        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "fetch: response headers");
        let headers = flatten_headers(response.headers());
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(FetchError::Body))
            .take_until(cancel.cancelled_owned())
            .boxed();

        Ok(FetchResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            headers,
            body,
        })
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn parse_method(raw: &str) -> Result<Method, FetchError> {
    Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
        .map_err(|_| FetchError::controlled(400, "INVALID_METHOD", format!("invalid method: {raw}")))
}

fn build_headers(raw: &BTreeMap<String, String>) -> Result<HeaderMap, FetchError> {
    let mut headers = HeaderMap::new();
    for (name, value) in raw {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| FetchError::controlled(400, "INVALID_HEADER", format!("invalid header name: {name}")))?;
        if HOP_BY_HOP_HEADERS.contains(&name.as_str()) {
            continue;
        }
        let value = HeaderValue::from_str(value)
            .map_err(|_| FetchError::controlled(400, "INVALID_HEADER", format!("invalid value for header {name}")))?;
        headers.append(name, value);
    }
    Ok(headers)
}

/// Collapse repeated headers into one comma-joined value per name.
fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        out.entry(name.as_str().to_owned())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    out
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(err)
    } else if err.is_connect() {
        FetchError::Connect(err)
    } else {
        FetchError::Request(err)
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
