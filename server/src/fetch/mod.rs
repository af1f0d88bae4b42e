//! Fetch: the outbound HTTP collaborator.
//!
//! DESIGN
//! ======
//! The relay core only sees the [`Fetcher`] trait: hand it a request
//! description and a cancellation token, get back a status line, headers,
//! and a lazy body stream. [`ReqwestFetcher`] is the production
//! implementation; tests substitute in-process fakes.
//!
//! ERROR HANDLING
//! ==============
//! Anything refused before reaching the network (bad URL, blocked host,
//! invalid method or header) is a [`FetchError::Controlled`] carrying the
//! status and JSON body the peer should see. Everything else is a fault.

pub mod client;
pub mod types;

use tokio_util::sync::CancellationToken;

pub use client::{FetchConfig, ReqwestFetcher};
pub use types::{BodyStream, FetchError, FetchResponse};

use frames::HttpRequest;

/// Performs one outbound HTTP request.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Send `request`, resolving once response headers arrive.
    ///
    /// Implementations should stop work and return [`FetchError::Cancelled`]
    /// once `cancel` fires.
    async fn fetch(&self, request: HttpRequest, cancel: CancellationToken) -> Result<FetchResponse, FetchError>;
}
