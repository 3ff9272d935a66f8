//! Connection registry
//!
//! Tracks every live WebSocket connection, the outbound queue that feeds its
//! writer task, and the room (if any) it currently belongs to. Sending to a
//! connection that is gone or closing is a silent no-op.

use std::fmt;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::messages::ServerMessage;

/// Unique identity of one connection
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a random 8-byte hex identity
    pub fn generate() -> Result<Self, getrandom::Error> {
        let mut bytes = [0u8; 8];
        getrandom::fill(&mut bytes)?;
        Ok(Self(hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Frames queued for a connection's writer task
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close,
}

/// Sending half of a connection's outbound queue
pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

struct ConnectionEntry {
    tx: OutboundSender,
    room: Option<String>,
    closing: bool,
}

impl ConnectionEntry {
    fn is_open(&self) -> bool {
        !self.closing && !self.tx.is_closed()
    }
}

/// Live connections and their room association
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ConnectionEntry>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new connection with no room.
    ///
    /// Returns false (and keeps the existing entry) if `id` is already known.
    pub fn register(&self, id: ConnectionId, tx: OutboundSender) -> bool {
        let mut inserted = false;
        self.connections.entry(id).or_insert_with(|| {
            inserted = true;
            ConnectionEntry {
                tx,
                room: None,
                closing: false,
            }
        });
        inserted
    }

    /// Track a new connection under a freshly generated id.
    ///
    /// Ids are drawn from `generate` until one is not already in use, so a
    /// collision never hands one connection another's queue.
    pub fn register_unique<E>(
        &self,
        tx: OutboundSender,
        mut generate: impl FnMut() -> Result<ConnectionId, E>,
    ) -> Result<ConnectionId, E> {
        loop {
            let id = generate()?;
            if self.register(id.clone(), tx.clone()) {
                return Ok(id);
            }
            warn!("Connection id {} already in use, drawing another", id);
        }
    }

    /// Stop tracking a connection. Dropping the entry closes its outbound queue.
    pub fn unregister(&self, id: &ConnectionId) -> bool {
        let removed = self.connections.remove(id).is_some();
        if removed {
            debug!("Connection {} unregistered", id);
        }
        removed
    }

    /// Associate a connection with a room, replacing any previous room
    pub fn set_room(&self, id: &ConnectionId, room_id: &str) {
        if let Some(mut entry) = self.connections.get_mut(id) {
            entry.room = Some(room_id.to_string());
        }
    }

    /// Clear and return the room association
    pub fn take_room(&self, id: &ConnectionId) -> Option<String> {
        self.connections
            .get_mut(id)
            .and_then(|mut entry| entry.room.take())
    }

    /// Room the connection currently belongs to
    pub fn room_of(&self, id: &ConnectionId) -> Option<String> {
        self.connections.get(id).and_then(|entry| entry.room.clone())
    }

    /// Whether the connection is registered and its writer is still accepting frames
    pub fn is_open(&self, id: &ConnectionId) -> bool {
        self.connections
            .get(id)
            .map(|entry| entry.is_open())
            .unwrap_or(false)
    }

    /// Serialize and queue a server message. Best effort.
    pub fn send(&self, id: &ConnectionId, msg: &ServerMessage) -> bool {
        match msg.to_json() {
            Ok(json) => self.send_text(id, json),
            Err(e) => {
                warn!("Failed to serialize message for {}: {}", id, e);
                false
            }
        }
    }

    /// Queue an already-serialized frame. Best effort.
    pub fn send_text(&self, id: &ConnectionId, text: String) -> bool {
        match self.connections.get(id) {
            Some(entry) if entry.is_open() => entry.tx.send(Outbound::Text(text)).is_ok(),
            _ => false,
        }
    }

    /// Ask the writer to close the connection; later sends are dropped
    pub fn close(&self, id: &ConnectionId) {
        if let Some(mut entry) = self.connections.get_mut(id) {
            if !entry.closing {
                entry.closing = true;
                let _ = entry.tx.send(Outbound::Close);
            }
        }
    }

    /// Close every tracked connection
    pub fn close_all(&self) {
        for mut entry in self.connections.iter_mut() {
            if !entry.closing {
                entry.closing = true;
                let _ = entry.tx.send(Outbound::Close);
            }
        }
    }

    /// Number of tracked connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
