//! Signal protocol messages
//!
//! Every frame is a JSON object tagged by its `type` field. Negotiation
//! payloads (`offer`, `answer`, `ice-candidate`) are never looked into; only
//! the tag is read so the frame can be routed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use duet_core::ProtocolError;

/// Rejection text sent when a third peer tries to join
pub const ROOM_FULL: &str = "Room is full";

/// Messages sent by clients
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Join (or create) a room
    Join {
        #[serde(rename = "roomId")]
        room_id: String,
    },

    /// SDP offer, relayed as received
    Offer,

    /// SDP answer, relayed as received
    Answer,

    /// Trickled ICE candidate, relayed as received
    IceCandidate,

    /// Leave the current room
    Leave,

    /// Free-form text for the other peer. Both fields are passed on as
    /// sent, whatever their JSON type; absent or null fields are omitted.
    Chat {
        #[serde(default)]
        message: Option<Value>,
        #[serde(default)]
        timestamp: Option<Value>,
    },

    /// Any tag this server does not know about
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse a text frame, refusing anything above `max_len` bytes
    pub fn from_json(json: &str, max_len: usize) -> Result<Self, ProtocolError> {
        if json.len() > max_len {
            return Err(ProtocolError::MessageTooLarge {
                size: json.len(),
                max: max_len,
            });
        }

        Ok(serde_json::from_str(json)?)
    }
}

/// Messages sent by the server
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Join accepted
    #[serde(rename_all = "camelCase")]
    Joined {
        room_id: String,
        participant_count: usize,
        is_initiator: bool,
    },

    /// Sent to the first peer once the second one arrives
    StartCall,

    /// Error response
    Error { message: String },

    /// The other peer went away
    PeerLeft,

    /// Relayed chat text
    Chat {
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<Value>,
    },
}

impl ServerMessage {
    /// Create an error message
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Rejection for a join to a full room
    pub fn room_full() -> Self {
        Self::error(ROOM_FULL)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
