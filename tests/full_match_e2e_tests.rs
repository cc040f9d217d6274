//! Full happy path across all three tiers: lobby handoff to a real spawned
//! tetris match service, forfeit, and room recovery.
//!
//! The spawned child finds the test's ephemeral storage and lobby ports
//! through `ARCADIA__` environment overrides, which it inherits. This file
//! holds a single test so those process-wide variables cannot race another
//! case.

mod test_helpers;

use serde_json::{json, Value};
use std::time::Duration;

use arcadia_server::storage::StorageClient;
use test_helpers::{assert_ok, spawn_lobby_with, spawn_storage, test_config, TestClient};

#[tokio::test]
async fn room_full_path_through_a_real_match_service() {
    let dir = tempfile::tempdir().unwrap();
    let storage_addr = spawn_storage(dir.path()).await;

    let mut cfg = test_config(storage_addr, dir.path());
    cfg.game.default_command = vec![env!("CARGO_BIN_EXE_tetris").to_string()];
    cfg.game.ready_timeout_secs = 5;
    let lobby = spawn_lobby_with(cfg).await;

    // The child process reads the same shared config module; hand it the
    // ephemeral service addresses through the env override channel.
    std::env::set_var("ARCADIA__STORAGE__HOST", storage_addr.ip().to_string());
    std::env::set_var("ARCADIA__STORAGE__PORT", storage_addr.port().to_string());
    std::env::set_var("ARCADIA__LOBBY__HOST", lobby.ip().to_string());
    std::env::set_var("ARCADIA__LOBBY__PORT", lobby.port().to_string());
    std::env::set_var("ARCADIA__LOGGING__ENABLE_FILE_LOGGING", "false");

    let mut alice = TestClient::connect(lobby).await;
    assert_ok(&alice.register("alice", "pw").await);
    assert_ok(&alice.login("alice", "pw").await);
    let mut bob = TestClient::connect(lobby).await;
    assert_ok(&bob.register("bob", "pw").await);
    assert_ok(&bob.login("bob", "pw").await);

    alice.send("create_room", json!({ "name": "finals" })).await;
    let update = alice.recv_push("ROOM_UPDATE").await;
    let room_id = update["room_id"].as_u64().unwrap();
    bob.send("join_room", json!({ "room_id": room_id })).await;
    bob.recv_push("ROOM_UPDATE").await;

    // Handoff: both players learn the freshly spawned endpoint.
    alice.send("start_game", Value::Null).await;
    let start_alice = alice.recv_push("GAME_START").await;
    let start_bob = bob.recv_push("GAME_START").await;
    assert_eq!(start_alice["room_id"], room_id);
    assert_eq!(start_alice["port"], start_bob["port"]);
    let port = start_alice["port"].as_u64().unwrap() as u16;
    let host = start_alice["host"].as_str().unwrap();

    // Connect in player order; P1 is the first accepted connection.
    let match_addr = format!("{host}:{port}").parse().unwrap();
    let mut p1 = TestClient::connect(match_addr).await;
    let welcome = p1.recv().await;
    assert_eq!(welcome["type"], "WELCOME");
    assert_eq!(welcome["role"], "P1");
    let mut p2 = TestClient::connect(match_addr).await;
    let welcome = p2.recv().await;
    assert_eq!(welcome["role"], "P2");

    // Play a little, then bob concedes.
    p1.send_raw(br#"{"type":"INPUT","action":"MOVE_LEFT"}"#).await;
    p1.send_raw(br#"{"type":"INPUT","action":"HARD_DROP"}"#).await;
    p2.send_raw(br#"{"type":"FORFEIT"}"#).await;

    let over = p1
        .recv_until(|m| m.get("type").and_then(Value::as_str) == Some("GAME_OVER"))
        .await;
    assert_eq!(over["winner"], "P1");
    assert_eq!(over["winner_username"], "alice");
    assert_eq!(over["reason"], "forfeit");
    assert_eq!(over["room_id"], room_id);
    p2.recv_until(|m| m.get("type").and_then(Value::as_str) == Some("GAME_OVER"))
        .await;

    // The match service notifies the lobby; the room dissolves and both
    // players come back online.
    let rooms = alice
        .recv_until(|m| {
            m.get("rooms")
                .and_then(Value::as_array)
                .is_some_and(Vec::is_empty)
        })
        .await;
    assert!(rooms["rooms"].as_array().unwrap().is_empty());
    let users = alice
        .recv_until(|m| {
            m.get("users").is_some_and(|users| {
                users
                    .as_array()
                    .is_some_and(|rows| rows.iter().all(|u| u["status"] == "online"))
            })
        })
        .await;
    assert_eq!(users["users"].as_array().unwrap().len(), 2);

    // Exactly one fresh log for this match, participants in player order.
    let storage = StorageClient::new(storage_addr.to_string());
    let mut logs = Vec::new();
    for _ in 0..50 {
        logs = storage.query_game_logs(Some("alice")).await.unwrap();
        if !logs.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].users, vec!["alice".to_string(), "bob".to_string()]);
    assert!(logs[0].matchid.starts_with("match_"));
}
