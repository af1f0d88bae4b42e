//! Sequence → WebSocket bridge registry.
//!
//! Each entry carries a generation so a bridge only ever removes its own
//! registration, even if the sequence id was reused after it closed.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};

use crate::socket::OutgoingMessage;

/// Instruction from the dispatcher to one bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SocketCommand {
    Send(OutgoingMessage),
    Close,
}

struct Entry {
    generation: u64,
    commands: mpsc::UnboundedSender<SocketCommand>,
}

#[derive(Default)]
struct Inner {
    next_generation: u64,
    sockets: HashMap<u16, Entry>,
}

#[derive(Clone, Default)]
pub(crate) struct Registry {
    inner: Arc<RwLock<Inner>>,
}

/// A fresh registration handed to the bridge that owns it.
pub(crate) struct Registration {
    pub generation: u64,
    pub commands: mpsc::UnboundedReceiver<SocketCommand>,
}

impl Registry {
    /// Claim `sequence`. Returns `None` if a live bridge already holds it.
    pub async fn register(&self, sequence: u16) -> Option<Registration> {
        let mut inner = self.inner.write().await;
        if inner.sockets.contains_key(&sequence) {
            return None;
        }
        inner.next_generation += 1;
        let generation = inner.next_generation;
        let (tx, rx) = mpsc::unbounded_channel();
        inner.sockets.insert(sequence, Entry { generation, commands: tx });
        Some(Registration { generation, commands: rx })
    }

    /// Queue `command` for the bridge on `sequence`. Returns `false` when no
    /// bridge is registered.
    pub async fn dispatch(&self, sequence: u16, command: SocketCommand) -> bool {
        let inner = self.inner.read().await;
        inner
            .sockets
            .get(&sequence)
            .is_some_and(|entry| entry.commands.send(command).is_ok())
    }

    pub async fn remove(&self, sequence: u16, generation: u64) {
        let mut inner = self.inner.write().await;
        if inner.sockets.get(&sequence).is_some_and(|e| e.generation == generation) {
            inner.sockets.remove(&sequence);
        }
    }

    /// Drop every registration. Bridges see their command channel close and
    /// shut their sockets down.
    pub async fn clear(&self) -> usize {
        let mut inner = self.inner.write().await;
        let count = inner.sockets.len();
        inner.sockets.clear();
        count
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.sockets.len()
    }
}
