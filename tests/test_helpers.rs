//! Shared fixtures for the integration suites: a storage service on an
//! ephemeral port, a lobby wired to it, and a frame-speaking test client.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use arcadia_server::config::Config;
use arcadia_server::lobby::LobbyServer;
use arcadia_server::protocol::framing;
use arcadia_server::storage::{server as storage_server, StorageService};

/// Spawn a storage service over TCP on an ephemeral port.
pub async fn spawn_storage(data_dir: &Path) -> SocketAddr {
    let service = Arc::new(StorageService::open(data_dir).await.unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    tokio::spawn(storage_server::serve(listener, service, shutdown));
    addr
}

/// Build a config pointing the lobby at `storage_addr`, with artifacts and
/// collections under `data_dir`.
pub fn test_config(storage_addr: SocketAddr, data_dir: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.lobby.host = "127.0.0.1".to_string();
    cfg.storage.host = storage_addr.ip().to_string();
    cfg.storage.port = storage_addr.port();
    cfg.storage.data_dir = data_dir.to_string_lossy().to_string();
    cfg.game.start_port = 29000;
    cfg.game.ready_timeout_secs = 1;
    // Nothing at this path: match spawns fail, which the launch tests rely
    // on to observe the irreversible playing transition.
    cfg.game.default_command = vec!["/nonexistent/arcadia-test-game".to_string()];
    cfg
}

/// Spawn a full lobby (backed by a fresh storage service) and return its
/// address.
pub async fn spawn_lobby(data_dir: &Path) -> SocketAddr {
    let storage_addr = spawn_storage(data_dir).await;
    spawn_lobby_with(test_config(storage_addr, data_dir)).await
}

pub async fn spawn_lobby_with(cfg: Config) -> SocketAddr {
    let server = Arc::new(LobbyServer::new(Arc::new(cfg)));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    tokio::spawn(server.serve(listener, shutdown));
    addr
}

/// A client speaking the length-prefixed JSON protocol.
pub struct TestClient {
    stream: TcpStream,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        Self { stream }
    }

    pub async fn send(&mut self, action: &str, data: Value) {
        let request = if data.is_null() {
            json!({ "action": action })
        } else {
            json!({ "action": action, "data": data })
        };
        framing::send_message(&mut self.stream, &request)
            .await
            .unwrap();
    }

    pub async fn send_raw(&mut self, body: &[u8]) {
        framing::write_frame(&mut self.stream, body).await.unwrap();
    }

    /// Next frame, decoded. Panics after five seconds of silence.
    pub async fn recv(&mut self) -> Value {
        let frame = tokio::time::timeout(Duration::from_secs(5), framing::read_frame(&mut self.stream))
            .await
            .expect("timed out waiting for a frame")
            .expect("read error")
            .expect("connection closed");
        serde_json::from_slice(&frame).expect("frame was not JSON")
    }

    /// Skip frames until `pred` matches (bounded, to fail fast on protocol
    /// drift).
    pub async fn recv_until(&mut self, pred: impl Fn(&Value) -> bool) -> Value {
        for _ in 0..32 {
            let message = self.recv().await;
            if pred(&message) {
                return message;
            }
        }
        panic!("no matching frame within 32 messages");
    }

    pub async fn recv_push(&mut self, push_type: &str) -> Value {
        self.recv_until(|m| m.get("type").and_then(Value::as_str) == Some(push_type))
            .await
    }

    /// Next error reply, skipping pushes and ok-status list broadcasts.
    pub async fn recv_error(&mut self) -> Value {
        self.recv_until(|m| m.get("status").and_then(Value::as_str) == Some("error"))
            .await
    }

    /// True when the connection is closed (or yields nothing) within the
    /// timeout.
    pub async fn closed(&mut self) -> bool {
        matches!(
            tokio::time::timeout(Duration::from_secs(2), framing::read_frame(&mut self.stream))
                .await,
            Ok(Ok(None))
        )
    }

    // === Common flows ===

    pub async fn register(&mut self, user: &str, pass: &str) -> Value {
        self.send("register", json!({ "user": user, "pass": pass }))
            .await;
        self.recv().await
    }

    pub async fn register_developer(&mut self, user: &str, pass: &str) -> Value {
        self.send(
            "register",
            json!({ "user": user, "pass": pass, "is_developer": true }),
        )
        .await;
        self.recv().await
    }

    pub async fn login(&mut self, user: &str, pass: &str) -> Value {
        self.send("login", json!({ "user": user, "pass": pass }))
            .await;
        self.recv().await
    }
}

pub fn assert_ok(message: &Value) {
    assert_eq!(
        message.get("status").and_then(Value::as_str),
        Some("ok"),
        "expected ok, got {message}"
    );
}

pub fn assert_error(message: &Value, reason: &str) {
    assert_eq!(
        message.get("status").and_then(Value::as_str),
        Some("error"),
        "expected error, got {message}"
    );
    assert_eq!(
        message.get("reason").and_then(Value::as_str),
        Some(reason),
        "unexpected reason in {message}"
    );
}
