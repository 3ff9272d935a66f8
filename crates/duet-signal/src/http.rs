//! Minimal HTTP handling on the signaling port
//!
//! Browsers load the app, fetch ICE servers and poll health on the same port
//! they open the WebSocket on. Only `GET` and `HEAD` are answered.

use std::path::Path;

use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use duet_core::path::{content_type, resolve_request_path, safe_real_path};

use crate::error::ServerError;
use crate::server::ServerState;

/// Largest request head we are willing to look at
pub const MAX_REQUEST_HEAD: usize = 8 * 1024;

/// Parsed request line and headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    /// Bytes occupied by the head, including the blank line
    pub head_len: usize,
}

impl HttpRequest {
    /// Parse a request head.
    ///
    /// Returns `Ok(None)` until the full head is present, and
    /// [`ServerError::BadRequest`] once it is complete but unusable.
    pub fn parse(buf: &[u8]) -> Result<Option<Self>, ServerError> {
        let Some(end) = find_head_end(buf) else {
            return Ok(None);
        };
        let head = std::str::from_utf8(&buf[..end]).map_err(|_| ServerError::BadRequest)?;
        let mut lines = head.split("\r\n");

        let mut request_line = lines.next().unwrap_or_default().split_whitespace();
        let (Some(method), Some(path)) = (request_line.next(), request_line.next()) else {
            return Err(ServerError::BadRequest);
        };
        let method = method.to_string();
        let path = path.to_string();

        let headers = lines
            .filter(|line| !line.is_empty())
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
            .collect();

        Ok(Some(Self {
            method,
            path,
            headers,
            head_len: end + 4,
        }))
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether this is a WebSocket handshake
    pub fn is_websocket_upgrade(&self) -> bool {
        self.header("upgrade")
            .map(|v| v.to_ascii_lowercase().contains("websocket"))
            .unwrap_or(false)
    }
}

/// Offset of the `\r\n\r\n` terminating the head
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// A response ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: &'static str,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status: "200 OK",
                content_type: "application/json",
                body,
            },
            Err(_) => Self::error("500 Internal Server Error", "serialization failed"),
        }
    }

    pub fn error(status: &'static str, message: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: serde_json::json!({ "error": message }).to_string().into_bytes(),
        }
    }

    pub fn not_found() -> Self {
        Self::error("404 Not Found", "not found")
    }

    /// Serialize status line, headers and (unless `head_only`) the body
    pub fn to_bytes(&self, head_only: bool) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status,
            self.content_type,
            self.body.len()
        )
        .into_bytes();

        if !head_only {
            out.extend_from_slice(&self.body);
        }
        out
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    rooms: usize,
    connections: usize,
    timestamp: String,
}

/// Produce the response for a request
pub async fn route(req: &HttpRequest, state: &ServerState) -> HttpResponse {
    if req.method != "GET" && req.method != "HEAD" {
        return HttpResponse::error("405 Method Not Allowed", "method not allowed");
    }

    let path = req.path.split('?').next().unwrap_or_default();

    match path {
        "/health" => HttpResponse::json(&Health {
            status: "ok",
            rooms: state.coordinator.room_count(),
            connections: state.registry.len(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }),
        "/api/ice-servers" => HttpResponse::json(&state.config.ice.ice_servers()),
        _ => match &state.config.server.public_dir {
            Some(dir) => serve_static(dir, &req.path).await,
            None => HttpResponse::not_found(),
        },
    }
}

async fn serve_static(dir: &Path, url_path: &str) -> HttpResponse {
    let resolved = match resolve_request_path(dir, url_path)
        .and_then(|path| safe_real_path(dir, &path))
    {
        Ok(path) => path,
        Err(e) => {
            debug!("Static lookup for {} failed: {}", url_path, e);
            return HttpResponse::not_found();
        }
    };

    match tokio::fs::read(&resolved).await {
        Ok(body) => HttpResponse {
            status: "200 OK",
            content_type: content_type(&resolved),
            body,
        },
        Err(e) => {
            debug!("Failed to read {:?}: {}", resolved, e);
            HttpResponse::not_found()
        }
    }
}

/// Consume the request head from the socket and write the response
pub async fn handle_http_request(
    stream: &mut TcpStream,
    req: &HttpRequest,
    state: &ServerState,
) -> Result<(), ServerError> {
    let mut head = vec![0u8; req.head_len];
    stream.read_exact(&mut head).await?;

    let response = route(req, state).await;
    debug!("{} {} -> {}", req.method, req.path, response.status);

    stream
        .write_all(&response.to_bytes(req.method == "HEAD"))
        .await?;
    stream.shutdown().await?;
    Ok(())
}
