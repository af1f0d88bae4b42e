//! Outbound half of the channel: encodes relay messages and queues them for
//! the transport.

use tokio::sync::mpsc;
use tracing::trace;

use frames::{CodecError, RelayMessage};

#[derive(Debug, thiserror::Error)]
pub enum OutboundError {
    /// The transport dropped its receiver; the channel is gone.
    #[error("outbound channel closed")]
    Closed,
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Shared `send(bytes)` handle. Cheap to clone; every exchange holds one.
#[derive(Clone, Debug)]
pub struct Outbound {
    tx: mpsc::Sender<Vec<u8>>,
}

impl Outbound {
    #[must_use]
    pub fn new(tx: mpsc::Sender<Vec<u8>>) -> Self {
        Self { tx }
    }

    /// Encode `message` on `sequence` and queue it.
    ///
    /// # Errors
    ///
    /// Returns [`OutboundError::Closed`] once the transport is gone.
    pub async fn send(&self, sequence: u16, message: RelayMessage) -> Result<(), OutboundError> {
        let op = message.operation();
        let bytes = message.encode(sequence)?;
        trace!(seq = sequence, ?op, len = bytes.len(), "relay: send frame");
        self.tx.send(bytes).await.map_err(|_| OutboundError::Closed)
    }
}
