//! Signal server errors

use thiserror::Error;

/// Errors that end a single connection or stop the accept loop
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("failed to generate connection id: {0}")]
    Rng(String),

    #[error("malformed HTTP request")]
    BadRequest,
}

impl From<getrandom::Error> for ServerError {
    fn from(e: getrandom::Error) -> Self {
        ServerError::Rng(e.to_string())
    }
}
