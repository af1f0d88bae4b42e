//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the collaborators every relay channel shares: one HTTP fetcher and
//! one socket connector, both built once at startup. Each upgraded channel
//! gets its own [`Relay`] built from them.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;

use crate::config::RelayConfig;
use crate::fetch::{FetchError, Fetcher, ReqwestFetcher};
use crate::policy::HostPolicy;
use crate::relay::{Outbound, Relay, RelayOptions};
use crate::socket::{SocketConnector, TungsteniteConnector};

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Copy.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<dyn Fetcher>,
    pub connector: Arc<dyn SocketConnector>,
    pub options: RelayOptions,
    pub outbound_queue: usize,
    /// Currently open relay channels.
    pub channels: Arc<AtomicUsize>,
}

impl AppState {
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        connector: Arc<dyn SocketConnector>,
        options: RelayOptions,
        outbound_queue: usize,
    ) -> Self {
        Self { fetcher, connector, options, outbound_queue, channels: Arc::new(AtomicUsize::new(0)) }
    }

    /// Build production collaborators from config.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &RelayConfig) -> Result<Self, FetchError> {
        let policy = HostPolicy::new(&config.blocked_hosts);
        let fetcher = ReqwestFetcher::new(config.fetch, policy.clone())?;
        let connector = TungsteniteConnector::new(policy, config.fetch.connect_timeout);
        Ok(Self::new(Arc::new(fetcher), Arc::new(connector), config.relay, config.outbound_queue))
    }

    /// A fresh relay for one channel, plus the receiver its frames arrive on.
    #[must_use]
    pub fn new_relay(&self) -> (Relay, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(self.outbound_queue);
        let relay = Relay::new(Arc::clone(&self.fetcher), Arc::clone(&self.connector), Outbound::new(tx), self.options);
        (relay, rx)
    }

    #[must_use]
    pub fn open_channels(&self) -> usize {
        self.channels.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::test_helpers::{MockConnector, MockFetcher};

    fn test_state(queue: usize) -> AppState {
        let (connector, _sockets) = MockConnector::new(&[]);
        AppState::new(MockFetcher::new(Vec::new()), connector, RelayOptions::default(), queue)
    }

    #[test]
    fn new_state_has_no_channels() {
        assert_eq!(test_state(8).open_channels(), 0);
    }

    #[test]
    fn new_relay_uses_configured_queue_depth() {
        let state = test_state(3);
        let (relay, rx) = state.new_relay();
        assert!(!relay.is_closed());
        assert_eq!(rx.max_capacity(), 3);
    }

    #[test]
    fn from_config_builds_production_collaborators() {
        let config = RelayConfig::from_lookup(|_| None).expect("default config");
        let state = AppState::from_config(&config).expect("state");
        assert_eq!(state.outbound_queue, config.outbound_queue);
        assert_eq!(state.options, config.relay);
    }
}
