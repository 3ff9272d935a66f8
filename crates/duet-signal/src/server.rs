//! WebSocket signal server implementation

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout_at, Instant};
use tokio_tungstenite::accept_async_with_config;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use duet_core::Config;

use crate::coordinator::RoomCoordinator;
use crate::error::ServerError;
use crate::http::{self, HttpRequest, MAX_REQUEST_HEAD};
use crate::registry::{ConnectionId, ConnectionRegistry, Outbound};

/// How long a client gets to send its request head
const REQUEST_HEAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared state handed to every connection task
pub struct ServerState {
    pub registry: Arc<ConnectionRegistry>,
    pub coordinator: RoomCoordinator,
    pub config: Config,
}

impl ServerState {
    pub fn new(config: Config) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let coordinator = RoomCoordinator::new(registry.clone())
            .with_max_message_bytes(config.server.max_message_bytes);

        Self {
            registry,
            coordinator,
            config,
        }
    }
}

/// Signal server
#[derive(Clone)]
pub struct SignalServer {
    state: Arc<ServerState>,
}

impl SignalServer {
    pub fn new(config: Config) -> Self {
        Self {
            state: Arc::new(ServerState::new(config)),
        }
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn serve<F>(&self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let addr = SocketAddr::new(self.state.config.server.bind, self.state.config.server.port);
        let listener = TcpListener::bind(addr).await?;
        self.serve_listener(listener, shutdown).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves.
    ///
    /// On shutdown no new connections are accepted and every open
    /// connection is asked to close.
    pub async fn serve_listener<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!("Signal server listening on {}", listener.local_addr()?);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!("Accept failed: {}", e);
                            continue;
                        }
                    };
                    let state = self.state.clone();

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer_addr, state).await {
                            debug!("Connection error from {}: {}", peer_addr, e);
                        }
                    });
                }
                _ = &mut shutdown => {
                    info!("Shutting down, closing {} connections", self.state.registry.len());
                    self.state.registry.close_all();
                    return Ok(());
                }
            }
        }
    }

    /// Get room count (for monitoring)
    pub fn room_count(&self) -> usize {
        self.state.coordinator.room_count()
    }

    /// Get connection count (for monitoring)
    pub fn connection_count(&self) -> usize {
        self.state.registry.len()
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }
}

/// Handle a single connection (HTTP or WebSocket)
async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    state: Arc<ServerState>,
) -> Result<(), ServerError> {
    let request = peek_request_head(&stream).await?;

    if !request.is_websocket_upgrade() {
        return http::handle_http_request(&mut stream, &request, &state).await;
    }

    let ws_config = websocket_config(state.config.server.max_message_bytes);
    let ws_stream = accept_async_with_config(stream, Some(ws_config)).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let conn_id = state.registry.register_unique(tx, ConnectionId::generate)?;
    debug!("New connection from {} as {}", peer_addr, conn_id);

    // Pings are answered by tungstenite itself; only queued frames go out here.
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let result = match outbound {
                Outbound::Text(text) => ws_sender.send(Message::Text(text)).await,
                Outbound::Close => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            };
            if result.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => state.coordinator.handle_text(&conn_id, &text),
            Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
                Ok(text) => state.coordinator.handle_text(&conn_id, text),
                Err(_) => warn!("Dropping non-UTF-8 binary frame from {}", conn_id),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("WebSocket error: {:?}", e);
                break;
            }
        }
    }

    // Cleanup on disconnect
    state.coordinator.leave(&conn_id);
    state.registry.unregister(&conn_id);
    let _ = writer.await;

    debug!("Connection closed: {}", conn_id);
    Ok(())
}

/// Transport limits for one connection: frames and reassembled messages
/// above `max_message_bytes` fail the read and end that connection.
fn websocket_config(max_message_bytes: usize) -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(max_message_bytes);
    config.max_frame_size = Some(max_message_bytes);
    config
}

/// Peek until a complete request head is buffered, without consuming it
async fn peek_request_head(stream: &TcpStream) -> Result<HttpRequest, ServerError> {
    let deadline = Instant::now() + REQUEST_HEAD_TIMEOUT;
    let mut buf = vec![0u8; MAX_REQUEST_HEAD];

    loop {
        let n = timeout_at(deadline, stream.peek(&mut buf))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "request head timeout"))??;

        if n == 0 {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }

        if let Some(request) = HttpRequest::parse(&buf[..n])? {
            return Ok(request);
        }

        if n == buf.len() {
            return Err(ServerError::BadRequest);
        }

        sleep(Duration::from_millis(5)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_creation() {
        let server = SignalServer::new(Config::default());
        assert_eq!(server.room_count(), 0);
        assert_eq!(server.connection_count(), 0);
    }

    #[test]
    fn test_websocket_config_limits() {
        let config = websocket_config(4096);
        assert_eq!(config.max_message_size, Some(4096));
        assert_eq!(config.max_frame_size, Some(4096));
    }

    #[tokio::test]
    async fn test_invalid_head_rejected_without_waiting() {
        use tokio::io::AsyncWriteExt;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).await.unwrap();
        let (server_side, _) = listener.accept().await.unwrap();

        client
            .write_all(b"GET /\xff\xfe HTTP/1.1\r\nHost: x\r\n\r\n")
            .await
            .unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), peek_request_head(&server_side))
            .await
            .expect("head rejected before the request timeout");
        assert!(matches!(result, Err(ServerError::BadRequest)));
    }

    #[test]
    fn test_state_uses_configured_limit() {
        let mut config = Config::default();
        config.server.max_message_bytes = 16;
        let state = ServerState::new(config);

        let (tx, _rx) = mpsc::unbounded_channel();
        state.registry.register("a".into(), tx);
        state
            .coordinator
            .handle_text(&"a".into(), r#"{"type":"join","roomId":"lobby"}"#);
        assert_eq!(state.coordinator.room_count(), 0);
    }
}
