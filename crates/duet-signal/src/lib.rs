//! Duet Signal Server
//!
//! Rendezvous and relay for exactly two peers that want to open a direct
//! WebRTC connection. Clients connect via WebSocket, join a room by name and
//! exchange offers, answers and ICE candidates through the server.
//!
//! # Protocol
//!
//! 1. First peer joins a room and is told it is the initiator
//! 2. Second peer joins; the first peer receives `start-call`
//! 3. Initiator sends an offer, the other side answers, both trickle candidates
//! 4. Server relays those frames verbatim to the other peer
//! 5. When either peer leaves or disconnects, the other receives `peer-left`
//!
//! The same port answers plain HTTP for `/health`, `/api/ice-servers` and,
//! when configured, static files.

pub mod coordinator;
pub mod error;
pub mod http;
pub mod messages;
pub mod registry;
pub mod room;
pub mod server;

pub use coordinator::{JoinOutcome, LeaveOutcome, RoomCoordinator};
pub use error::ServerError;
pub use messages::{ClientMessage, ServerMessage};
pub use registry::{ConnectionId, ConnectionRegistry, Outbound};
pub use room::Room;
pub use server::{ServerState, SignalServer};

/// Maximum peers per room
pub const MAX_PEERS_PER_ROOM: usize = 2;
