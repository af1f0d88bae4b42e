//! In-process fakes for the fetch and socket collaborators.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};
use tokio_util::sync::CancellationToken;

use super::{Outbound, Relay, RelayOptions};
use crate::fetch::{BodyStream, FetchError, FetchResponse, Fetcher};
use crate::socket::{
    CloseInfo, IncomingMessage, OutgoingMessage, RelaySocket, SocketConnector, SocketError, SocketEvent,
};
use frames::{ClientMessage, Frame, HttpRequest, RelayMessage, WsOpen};

// =============================================================================
// FETCHER
// =============================================================================

pub enum MockReply {
    Ready(Result<FetchResponse, FetchError>),
    /// Ignores the token and resolves after the delay.
    Delayed(Duration, Result<FetchResponse, FetchError>),
}

#[derive(Default)]
pub struct MockFetcher {
    replies: Mutex<VecDeque<MockReply>>,
    pub requests: Mutex<Vec<HttpRequest>>,
}

impl MockFetcher {
    pub fn new(replies: Vec<MockReply>) -> Arc<Self> {
        Arc::new(Self { replies: Mutex::new(replies.into()), ..Self::default() })
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("mock mutex should lock").len()
    }
}

#[async_trait::async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: HttpRequest, cancel: CancellationToken) -> Result<FetchResponse, FetchError> {
        self.requests.lock().expect("mock mutex should lock").push(request);
        let reply = self.replies.lock().expect("mock mutex should lock").pop_front();
        match reply {
            Some(MockReply::Ready(result)) => result,
            Some(MockReply::Delayed(delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            // Out of replies: hang until the token fires.
            None => {
                cancel.cancelled().await;
                Err(FetchError::Cancelled)
            }
        }
    }
}

/// A 200-style response whose body yields `chunks` and then ends.
pub fn response(status: u16, chunks: &[&'static [u8]]) -> FetchResponse {
    let items: Vec<Result<Bytes, FetchError>> = chunks.iter().map(|c| Ok(Bytes::from_static(*c))).collect();
    response_with_body(status, futures::stream::iter(items).boxed())
}

/// Yields `first` at once, then `later` after `delay`, then ends.
pub fn delayed_chunk_response(status: u16, first: &'static [u8], later: &'static [u8], delay: Duration) -> FetchResponse {
    let head = futures::stream::iter([Ok::<_, FetchError>(Bytes::from_static(first))]);
    let tail = futures::stream::once(async move {
        tokio::time::sleep(delay).await;
        Ok::<_, FetchError>(Bytes::from_static(later))
    });
    response_with_body(status, head.chain(tail).boxed())
}

pub fn response_with_body(status: u16, body: BodyStream) -> FetchResponse {
    FetchResponse { status, status_text: "OK".to_owned(), headers: BTreeMap::new(), body }
}

// =============================================================================
// SOCKETS
// =============================================================================

/// What the bridge did to a mock socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketAction {
    Send(OutgoingMessage),
    Close,
}

/// Test-side handle for one connected mock socket.
pub struct MockSocketHandle {
    pub url: String,
    pub events: mpsc::UnboundedSender<Result<SocketEvent, SocketError>>,
    pub actions: mpsc::UnboundedReceiver<SocketAction>,
}

impl MockSocketHandle {
    pub fn push_text(&self, text: &str) {
        let _ = self.events.send(Ok(SocketEvent::Message(IncomingMessage::Text(text.to_owned()))));
    }

    pub fn push_binary(&self, data: &'static [u8]) {
        let _ = self.events.send(Ok(SocketEvent::Message(IncomingMessage::Binary(Bytes::from_static(data)))));
    }

    pub fn push_close(&self, code: u16, reason: &str, was_clean: bool) {
        let _ = self.events.send(Ok(SocketEvent::Closed(CloseInfo { code, reason: reason.to_owned(), was_clean })));
    }

    pub async fn next_action(&mut self) -> SocketAction {
        timeout(Duration::from_millis(500), self.actions.recv())
            .await
            .expect("socket action timed out")
            .expect("socket action channel closed")
    }

    pub async fn assert_no_action(&mut self) {
        assert!(
            timeout(Duration::from_millis(80), self.actions.recv()).await.is_err(),
            "expected no socket action"
        );
    }
}

pub struct MockConnector {
    handles: mpsc::UnboundedSender<MockSocketHandle>,
    refuse: HashSet<String>,
    pub connects: Mutex<Vec<String>>,
}

impl MockConnector {
    /// Connector plus the receiver that yields one handle per connect.
    pub fn new(refuse: &[&str]) -> (Arc<Self>, mpsc::UnboundedReceiver<MockSocketHandle>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            handles: tx,
            refuse: refuse.iter().map(|s| (*s).to_owned()).collect(),
            connects: Mutex::new(Vec::new()),
        };
        (Arc::new(connector), rx)
    }

    pub fn connect_count(&self) -> usize {
        self.connects.lock().expect("mock mutex should lock").len()
    }
}

#[async_trait::async_trait]
impl SocketConnector for MockConnector {
    async fn connect(&self, open: &WsOpen) -> Result<Box<dyn RelaySocket>, SocketError> {
        self.connects.lock().expect("mock mutex should lock").push(open.url.clone());
        if self.refuse.contains(&open.url) {
            return Err(SocketError::ConnectTimeout);
        }
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (actions_tx, actions_rx) = mpsc::unbounded_channel();
        let _ = self.handles.send(MockSocketHandle { url: open.url.clone(), events: events_tx, actions: actions_rx });
        Ok(Box::new(MockSocket { events: events_rx, actions: actions_tx }))
    }
}

struct MockSocket {
    events: mpsc::UnboundedReceiver<Result<SocketEvent, SocketError>>,
    actions: mpsc::UnboundedSender<SocketAction>,
}

#[async_trait::async_trait]
impl RelaySocket for MockSocket {
    async fn next_event(&mut self) -> Result<SocketEvent, SocketError> {
        match self.events.recv().await {
            Some(event) => event,
            None => Ok(SocketEvent::Closed(CloseInfo::abnormal())),
        }
    }

    async fn send(&mut self, message: OutgoingMessage) -> Result<(), SocketError> {
        let _ = self.actions.send(SocketAction::Send(message));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        let _ = self.actions.send(SocketAction::Close);
        Ok(())
    }
}

// =============================================================================
// RELAY HARNESS
// =============================================================================

pub struct Harness {
    pub relay: Relay,
    pub frames: mpsc::Receiver<Vec<u8>>,
    pub fetcher: Arc<MockFetcher>,
    pub connector: Arc<MockConnector>,
    pub sockets: mpsc::UnboundedReceiver<MockSocketHandle>,
}

impl Harness {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self::with_options(replies, &[], RelayOptions::default())
    }

    pub fn with_options(replies: Vec<MockReply>, refuse: &[&str], options: RelayOptions) -> Self {
        let (tx, frames) = mpsc::channel(64);
        let fetcher = MockFetcher::new(replies);
        let (connector, sockets) = MockConnector::new(refuse);
        let relay = Relay::new(fetcher.clone(), connector.clone(), Outbound::new(tx), options);
        Self { relay, frames, fetcher, connector, sockets }
    }

    pub async fn send(&self, sequence: u16, message: &ClientMessage) {
        let bytes = message.encode(sequence).expect("encode client frame");
        self.relay.on_message(Bytes::from(bytes)).await;
    }

    pub async fn send_raw(&self, bytes: &[u8]) {
        self.relay.on_message(Bytes::copy_from_slice(bytes)).await;
    }

    pub async fn recv(&mut self) -> (u16, RelayMessage) {
        let bytes = timeout(Duration::from_millis(500), self.frames.recv())
            .await
            .expect("frame receive timed out")
            .expect("outbound channel closed unexpectedly");
        let frame = Frame::decode(Bytes::from(bytes)).expect("relay frame header");
        let op = frame.op().expect("known relay operation");
        let message = RelayMessage::decode(op, frame.payload).expect("relay frame payload");
        (frame.sequence, message)
    }

    pub async fn assert_no_frame(&mut self) {
        assert!(
            timeout(Duration::from_millis(80), self.frames.recv()).await.is_err(),
            "expected no outbound frame"
        );
    }

    pub async fn next_socket(&mut self) -> MockSocketHandle {
        timeout(Duration::from_millis(500), self.sockets.recv())
            .await
            .expect("socket connect timed out")
            .expect("connector dropped")
    }
}

pub fn get(remote: &str) -> ClientMessage {
    ClientMessage::HttpRequest(HttpRequest {
        method: "GET".to_owned(),
        remote: remote.to_owned(),
        headers: BTreeMap::new(),
        body: None,
    })
}

pub fn ws_open(url: &str) -> ClientMessage {
    ClientMessage::WsOpen(WsOpen { url: url.to_owned(), protocols: Vec::new() })
}
