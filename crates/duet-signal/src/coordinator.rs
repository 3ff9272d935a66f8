//! Room coordinator
//!
//! Owns the room table and drives each room through its lifecycle:
//!
//! ```text
//! (absent) --join--> Waiting --join--> Active
//!    ^                  |  ^             |
//!    +------leave-------+  +----leave----+
//! ```
//!
//! Every read-modify-write on a room runs while holding that room's map
//! entry, so two simultaneous joins to the same key cannot both become the
//! initiator and a room is never left behind with zero members. Lock order is
//! always room table first, then connection registry; the registry never
//! calls back into the coordinator.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::messages::{ClientMessage, ServerMessage};
use crate::registry::{ConnectionId, ConnectionRegistry};
use crate::room::{Room, RoomError, RoomState};

/// Result of a join request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Room was created; the joiner is the initiator
    Created,
    /// Joined as the second member; the first member was told to start
    Joined,
    /// Room already had two members
    Full,
}

/// Result of a leave request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Connection was not in a room
    NotInRoom,
    /// Remaining member was sent `peer-left`
    PeerNotified,
    /// Connection was the last member; room deleted
    RoomClosed,
}

/// Room membership and message fan-out
pub struct RoomCoordinator {
    /// Active rooms by room id
    rooms: DashMap<String, Room>,
    /// Connection lookup and delivery
    registry: Arc<ConnectionRegistry>,
    /// Frames longer than this are dropped
    max_message_bytes: usize,
}

impl RoomCoordinator {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            rooms: DashMap::new(),
            registry,
            max_message_bytes: duet_core::MAX_MESSAGE_SIZE,
        }
    }

    /// Override the inbound frame size limit
    pub fn with_max_message_bytes(mut self, max: usize) -> Self {
        self.max_message_bytes = max;
        self
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Parse and dispatch one inbound text frame.
    ///
    /// Malformed frames are logged and dropped; nothing is sent back.
    pub fn handle_text(&self, conn: &ConnectionId, text: &str) {
        match ClientMessage::from_json(text, self.max_message_bytes) {
            Ok(msg) => self.dispatch(conn, msg, text),
            Err(e) => warn!("Dropping malformed message from {}: {}", conn, e),
        }
    }

    /// Route a parsed message. `raw` is the frame as received, forwarded
    /// verbatim for negotiation messages.
    pub fn dispatch(&self, conn: &ConnectionId, msg: ClientMessage, raw: &str) {
        match msg {
            ClientMessage::Join { room_id } => {
                self.join(conn, &room_id);
            }
            ClientMessage::Offer | ClientMessage::Answer | ClientMessage::IceCandidate => {
                self.relay(conn, raw.to_string());
            }
            ClientMessage::Leave => {
                self.leave(conn);
            }
            ClientMessage::Chat { message, timestamp } => {
                self.relay_message(conn, &ServerMessage::Chat { message, timestamp });
            }
            ClientMessage::Unknown => {
                debug!("Ignoring unknown message type from {}", conn);
            }
        }
    }

    /// Join `room_id`, creating it if needed.
    ///
    /// A connection that is already in a room leaves it first.
    pub fn join(&self, conn: &ConnectionId, room_id: &str) -> JoinOutcome {
        if self.registry.room_of(conn).is_some() {
            debug!("{} switching rooms, leaving current room first", conn);
            self.leave(conn);
        }

        match self.rooms.entry(room_id.to_string()) {
            Entry::Vacant(entry) => {
                entry.insert(Room::new(room_id.to_string(), conn.clone()));
                self.registry.set_room(conn, room_id);
                self.registry.send(
                    conn,
                    &ServerMessage::Joined {
                        room_id: room_id.to_string(),
                        participant_count: 1,
                        is_initiator: true,
                    },
                );

                info!(
                    "Client {} joined room: {}, participants: 1, isInitiator: true",
                    conn, room_id
                );
                JoinOutcome::Created
            }
            Entry::Occupied(mut entry) => {
                let room = entry.get_mut();
                let participant_count = match room.add_member(conn.clone()) {
                    Ok(count) => count,
                    Err(RoomError::RoomFull) | Err(RoomError::AlreadyMember) => {
                        self.registry.send(conn, &ServerMessage::room_full());
                        info!("Client {} rejected from room {}: full", conn, room_id);
                        return JoinOutcome::Full;
                    }
                };

                self.registry.set_room(conn, room_id);
                self.registry.send(
                    conn,
                    &ServerMessage::Joined {
                        room_id: room_id.to_string(),
                        participant_count,
                        is_initiator: false,
                    },
                );

                if room.state() == RoomState::Active {
                    if let Some(initiator) = room.other_member(conn) {
                        debug!("Sending start-call to initiator {}", initiator);
                        self.registry.send(initiator, &ServerMessage::StartCall);
                    }
                }

                info!(
                    "Client {} joined room: {}, participants: {}, isInitiator: false",
                    conn, room_id, participant_count
                );
                JoinOutcome::Joined
            }
        }
    }

    /// Forward a pre-serialized frame to the other member of `conn`'s room
    pub fn relay(&self, conn: &ConnectionId, payload: String) -> bool {
        let Some(room_id) = self.registry.room_of(conn) else {
            return false;
        };

        let other = self
            .rooms
            .get(&room_id)
            .and_then(|room| room.other_member(conn).cloned());

        match other {
            Some(other) => self.registry.send_text(&other, payload),
            None => false,
        }
    }

    /// Serialize and forward a message to the other member of `conn`'s room
    pub fn relay_message(&self, conn: &ConnectionId, msg: &ServerMessage) -> bool {
        match msg.to_json() {
            Ok(json) => self.relay(conn, json),
            Err(e) => {
                warn!("Failed to serialize relayed message from {}: {}", conn, e);
                false
            }
        }
    }

    /// Remove `conn` from its room. Safe to call repeatedly.
    pub fn leave(&self, conn: &ConnectionId) -> LeaveOutcome {
        let Some(room_id) = self.registry.take_room(conn) else {
            return LeaveOutcome::NotInRoom;
        };

        match self.rooms.entry(room_id) {
            Entry::Occupied(mut entry) => {
                if !entry.get_mut().remove_member(conn) {
                    return LeaveOutcome::NotInRoom;
                }

                if entry.get().is_empty() {
                    let (room_id, room) = entry.remove_entry();
                    info!("Client {} left room: {}", conn, room_id);
                    debug!("Room {} removed (empty) after {:?}", room_id, room.age());
                    return LeaveOutcome::RoomClosed;
                }

                for remaining in entry.get().members() {
                    self.registry.send(remaining, &ServerMessage::PeerLeft);
                }
                info!("Client {} left room: {}", conn, entry.key());
                LeaveOutcome::PeerNotified
            }
            Entry::Vacant(_) => LeaveOutcome::NotInRoom,
        }
    }

    /// Number of rooms in the table
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Member count of a room, if it exists
    pub fn member_count(&self, room_id: &str) -> Option<usize> {
        self.rooms.get(room_id).map(|room| room.member_count())
    }

    pub fn contains_room(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }
}
