//! Error types shared by Duet components

use thiserror::Error;

/// Envelope-level errors raised while decoding client frames
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        ProtocolError::Deserialization(e.to_string())
    }
}

/// Static file path resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path traversal attempt blocked: {0}")]
    Traversal(String),

    #[error("path not found")]
    NotFound,
}

/// Configuration errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}
