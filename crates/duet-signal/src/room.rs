//! Room membership
//!
//! A room is a rendezvous point for exactly two peers. Members are kept in
//! arrival order; the first one to arrive is the initiator.

use std::time::Instant;

use crate::registry::ConnectionId;
use crate::MAX_PEERS_PER_ROOM;

/// Lifecycle of a room that exists in the table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoomState {
    /// One member, waiting for a peer
    Waiting,
    /// Two members, negotiation in progress or done
    Active,
}

/// A room where two peers find each other
pub struct Room {
    /// Caller-supplied room key
    pub room_id: String,

    /// Members in arrival order
    members: Vec<ConnectionId>,

    /// When the room was created
    created_at: Instant,
}

impl Room {
    /// Create a room with its first member
    pub fn new(room_id: String, first: ConnectionId) -> Self {
        Self {
            room_id,
            members: vec![first],
            created_at: Instant::now(),
        }
    }

    /// Add a member, returning the new member count
    pub fn add_member(&mut self, id: ConnectionId) -> Result<usize, RoomError> {
        if self.members.contains(&id) {
            return Err(RoomError::AlreadyMember);
        }
        if self.is_full() {
            return Err(RoomError::RoomFull);
        }

        self.members.push(id);
        Ok(self.members.len())
    }

    /// Remove a member, returning whether it was present
    pub fn remove_member(&mut self, id: &ConnectionId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != id);
        self.members.len() != before
    }

    /// The member that is not `id`
    pub fn other_member(&self, id: &ConnectionId) -> Option<&ConnectionId> {
        self.members.iter().find(|m| *m != id)
    }

    /// All members in arrival order
    pub fn members(&self) -> &[ConnectionId] {
        &self.members
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= MAX_PEERS_PER_ROOM
    }

    pub fn state(&self) -> RoomState {
        if self.is_full() {
            RoomState::Active
        } else {
            RoomState::Waiting
        }
    }

    /// How long the room has existed
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}

/// Room errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    RoomFull,
    AlreadyMember,
}
