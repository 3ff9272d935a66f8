//! End-to-end tests against a live server on a loopback port

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use duet_core::Config;
use duet_signal::SignalServer;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn start_server(config: Config) -> (SocketAddr, SignalServer, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = SignalServer::new(config);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let handle = server.clone();
    tokio::spawn(async move {
        handle
            .serve_listener(listener, async {
                let _ = shutdown_rx.await;
            })
            .await
            .unwrap();
    });

    (addr, server, shutdown_tx)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    ws
}

async fn send(ws: &mut Client, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

async fn recv_text(ws: &mut Client) -> String {
    loop {
        let msg = timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for message")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return text;
        }
    }
}

async fn recv(ws: &mut Client) -> Value {
    serde_json::from_str(&recv_text(ws).await).unwrap()
}

async fn assert_silent(ws: &mut Client) {
    let result = timeout(Duration::from_millis(200), ws.next()).await;
    assert!(result.is_err(), "unexpected message: {:?}", result);
}

async fn http_get(addr: SocketAddr, path: &str) -> (String, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path).as_bytes())
        .await
        .unwrap();

    let mut raw = String::new();
    timeout(WAIT, stream.read_to_string(&mut raw))
        .await
        .unwrap()
        .unwrap();

    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    (head.to_string(), body.to_string())
}

#[tokio::test]
async fn test_two_peer_session() {
    let (addr, server, _shutdown) = start_server(Config::default()).await;

    let mut a = connect(addr).await;
    send(&mut a, json!({"type":"join","roomId":"r1"})).await;
    assert_eq!(
        recv(&mut a).await,
        json!({"type":"joined","roomId":"r1","participantCount":1,"isInitiator":true})
    );

    let mut b = connect(addr).await;
    send(&mut b, json!({"type":"join","roomId":"r1"})).await;
    assert_eq!(
        recv(&mut b).await,
        json!({"type":"joined","roomId":"r1","participantCount":2,"isInitiator":false})
    );
    assert_eq!(recv(&mut a).await, json!({"type":"start-call"}));

    let offer = r#"{"type":"offer","offer":{"type":"offer","sdp":"v=0\r\n"}}"#;
    a.send(Message::Text(offer.to_string())).await.unwrap();
    assert_eq!(recv_text(&mut b).await, offer);

    let answer = r#"{"type":"answer","answer":{"type":"answer","sdp":"v=0\r\n"}}"#;
    b.send(Message::Text(answer.to_string())).await.unwrap();
    assert_eq!(recv_text(&mut a).await, answer);

    send(&mut b, json!({"type":"chat","message":"hi","timestamp":42})).await;
    assert_eq!(
        recv(&mut a).await,
        json!({"type":"chat","message":"hi","timestamp":42})
    );
    assert_silent(&mut b).await;

    b.close(None).await.unwrap();
    assert_eq!(recv(&mut a).await, json!({"type":"peer-left"}));

    a.close(None).await.unwrap();
    timeout(WAIT, async {
        while server.room_count() != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("room was not removed");

    let mut c = connect(addr).await;
    send(&mut c, json!({"type":"join","roomId":"r1"})).await;
    assert_eq!(recv(&mut c).await["isInitiator"], true);
}

#[tokio::test]
async fn test_third_peer_rejected() {
    let (addr, _server, _shutdown) = start_server(Config::default()).await;

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    let mut c = connect(addr).await;

    send(&mut a, json!({"type":"join","roomId":"full"})).await;
    recv(&mut a).await;
    send(&mut b, json!({"type":"join","roomId":"full"})).await;
    recv(&mut b).await;
    recv(&mut a).await;

    send(&mut c, json!({"type":"join","roomId":"full"})).await;
    assert_eq!(
        recv(&mut c).await,
        json!({"type":"error","message":"Room is full"})
    );
    assert_silent(&mut a).await;
    assert_silent(&mut b).await;
}

#[tokio::test]
async fn test_malformed_frames_keep_connection() {
    let (addr, _server, _shutdown) = start_server(Config::default()).await;

    let mut a = connect(addr).await;
    a.send(Message::Text("{garbage".into())).await.unwrap();
    send(&mut a, json!({"type":"wave"})).await;
    assert_silent(&mut a).await;

    send(&mut a, json!({"type":"join","roomId":"still-alive"})).await;
    assert_eq!(recv(&mut a).await["type"], "joined");
}

#[tokio::test]
async fn test_oversized_frame_ends_only_that_connection() {
    let mut config = Config::default();
    config.server.max_message_bytes = 1024;
    let (addr, _server, _shutdown) = start_server(config).await;

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    send(&mut a, json!({"type":"join","roomId":"big"})).await;
    recv(&mut a).await;
    send(&mut b, json!({"type":"join","roomId":"big"})).await;
    recv(&mut b).await;
    recv(&mut a).await;

    let huge = json!({"type":"chat","message":"x".repeat(4096)});
    let _ = b.send(Message::Text(huge.to_string())).await;

    assert_eq!(recv(&mut a).await, json!({"type":"peer-left"}));
    send(&mut a, json!({"type":"chat","message":"anyone?"})).await;
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn test_chat_fields_passed_through() {
    let (addr, _server, _shutdown) = start_server(Config::default()).await;

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    send(&mut a, json!({"type":"join","roomId":"talk"})).await;
    recv(&mut a).await;
    send(&mut b, json!({"type":"join","roomId":"talk"})).await;
    recv(&mut b).await;
    recv(&mut a).await;

    send(&mut b, json!({"type":"chat","message":"no clock"})).await;
    assert_eq!(recv(&mut a).await, json!({"type":"chat","message":"no clock"}));

    send(&mut b, json!({"type":"chat","message":"iso","timestamp":"2024-01-01T00:00:00Z"})).await;
    assert_eq!(
        recv(&mut a).await,
        json!({"type":"chat","message":"iso","timestamp":"2024-01-01T00:00:00Z"})
    );
}

#[tokio::test]
async fn test_http_endpoints() {
    let (addr, _server, _shutdown) = start_server(Config::default()).await;

    let (head, body) = http_get(addr, "/health").await;
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    let health: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "ok");

    let (head, body) = http_get(addr, "/api/ice-servers").await;
    assert!(head.contains("Content-Type: application/json"));
    let ice: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(ice["iceServers"][0]["urls"], "stun:stun.l.google.com:19302");

    let (head, _) = http_get(addr, "/missing").await;
    assert!(head.starts_with("HTTP/1.1 404"));
}

#[tokio::test]
async fn test_shutdown_closes_connections() {
    let (addr, server, shutdown) = start_server(Config::default()).await;

    let mut a = connect(addr).await;
    send(&mut a, json!({"type":"join","roomId":"bye"})).await;
    recv(&mut a).await;
    assert_eq!(server.connection_count(), 1);

    shutdown.send(()).unwrap();

    let closed = timeout(WAIT, async {
        loop {
            match a.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}
