//! Duet Core - configuration, ICE server discovery and shared error types
//!
//! This crate holds everything the signal server needs that is not tied to
//! a transport. It has no dependencies on networking code.

pub mod config;
pub mod error;
pub mod ice;
pub mod path;

pub use config::{Config, ServerConfig};
pub use error::*;
pub use ice::{IceConfig, IceServer, IceServerList, MeteredCredentials, TurnServer};

/// Default HTTP/WebSocket port
pub const DEFAULT_PORT: u16 = 3000;

/// Maximum inbound message size (64 KB)
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Maximum request path length in bytes
pub const MAX_PATH_LEN: usize = 4096;

/// Maximum filename length in bytes
pub const MAX_FILENAME_LEN: usize = 255;
