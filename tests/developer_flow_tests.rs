//! Developer actions and the artifact lifecycle: upload, browse, download,
//! update, soft delete, and game-log queries through the lobby.

mod test_helpers;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use test_helpers::{assert_error, assert_ok, spawn_lobby, spawn_storage, test_config, spawn_lobby_with, TestClient};

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

async fn logged_in(lobby: std::net::SocketAddr, name: &str, developer: bool) -> TestClient {
    let mut client = TestClient::connect(lobby).await;
    if developer {
        assert_ok(&client.register_developer(name, "pw").await);
    } else {
        assert_ok(&client.register(name, "pw").await);
    }
    assert_ok(&client.login(name, "pw").await);
    client
}

#[tokio::test]
async fn upload_requires_the_developer_flag() {
    let dir = tempfile::tempdir().unwrap();
    let lobby = spawn_lobby(dir.path()).await;

    let mut player = logged_in(lobby, "player", false).await;
    player
        .send(
            "upload_game",
            json!({
                "name": "tetris",
                "version": "1",
                "file_data": BASE64.encode(b"PRINT HELLO"),
            }),
        )
        .await;
    assert_error(&player.recv().await, "not_developer");

    player.send("list_my_games", Value::Null).await;
    assert_error(&player.recv().await, "not_developer");
}

#[tokio::test]
async fn upload_download_remove_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let lobby = spawn_lobby(dir.path()).await;

    let mut dev = logged_in(lobby, "dev", true).await;
    let mut player = logged_in(lobby, "player", false).await;

    let payload = b"PRINT HELLO";
    dev.send(
        "upload_game",
        json!({
            "name": "tetris",
            "description": "falling blocks",
            "version": "1",
            "file_data": BASE64.encode(payload),
        }),
    )
    .await;
    let reply = dev.recv().await;
    assert_ok(&reply);
    assert_eq!(reply["reason"], "game_uploaded");
    let game_id = reply["game_id"].as_u64().unwrap();
    assert_eq!(reply["version"], "1");

    // The artifact landed in the catalog layout.
    let stored = dir
        .path()
        .join("games")
        .join(game_id.to_string())
        .join("v1")
        .join("game.py");
    assert_eq!(std::fs::read(&stored).unwrap(), payload);

    // Any user can browse and download it.
    player.send("list_games", Value::Null).await;
    let listing = player.recv_until(|m| m.get("games").is_some()).await;
    assert_eq!(listing["games"][0]["name"], "tetris");

    player.send("search_games", json!({ "query": "BLOCK" })).await;
    let found = player.recv_until(|m| m.get("games").is_some()).await;
    assert_eq!(found["games"].as_array().unwrap().len(), 1);

    player
        .send("download_game", json!({ "game_id": game_id }))
        .await;
    let download = player
        .recv_until(|m| m.get("action").and_then(Value::as_str) == Some("download_game"))
        .await;
    assert_ok(&download);
    assert_eq!(download["game_name"], "tetris");
    assert_eq!(download["version"], "1");
    let bytes = BASE64
        .decode(download["file_data"].as_str().unwrap())
        .unwrap();
    assert_eq!(bytes, payload);
    assert_eq!(download["file_hash"], json!(sha256_hex(payload)));

    // Soft delete: listings forget it, direct lookup and the broadcast
    // remain.
    dev.send("remove_game", json!({ "game_id": game_id })).await;
    let reply = dev.recv_until(|m| m.get("status").is_some()).await;
    assert_ok(&reply);
    assert_eq!(reply["reason"], "game_removed");

    let deleted = player.recv_push("GAME_DELETED").await;
    assert_eq!(deleted["game_id"], game_id);

    player.send("list_games", Value::Null).await;
    let listing = player.recv_until(|m| m.get("games").is_some()).await;
    assert!(listing["games"].as_array().unwrap().is_empty());

    player
        .send("get_game_info", json!({ "game_id": game_id }))
        .await;
    let info = player.recv_until(|m| m.get("game").is_some()).await;
    assert_eq!(info["game"]["deleted"], true);

    // Files stay on disk after the soft delete.
    assert!(stored.exists());
}

#[tokio::test]
async fn update_game_paths() {
    let dir = tempfile::tempdir().unwrap();
    let lobby = spawn_lobby(dir.path()).await;

    let mut dev = logged_in(lobby, "dev", true).await;
    let mut rival = logged_in(lobby, "rival", true).await;

    dev.send(
        "upload_game",
        json!({ "name": "snake", "version": "1", "file_data": BASE64.encode(b"v1") }),
    )
    .await;
    let reply = dev.recv().await;
    let game_id = reply["game_id"].as_u64().unwrap();

    // Only the author may touch it.
    rival
        .send(
            "update_game",
            json!({ "game_id": game_id, "name": "stolen", "version": "2" }),
        )
        .await;
    assert_error(&rival.recv().await, "not_game_owner");

    // Metadata-only update.
    dev.send(
        "update_game",
        json!({ "game_id": game_id, "name": "super snake", "description": "longer", "version": "1" }),
    )
    .await;
    let reply = dev.recv().await;
    assert_ok(&reply);
    assert_eq!(reply["reason"], "game_updated");

    dev.send("get_game_info", json!({ "game_id": game_id })).await;
    let info = dev.recv_until(|m| m.get("game").is_some()).await;
    assert_eq!(info["game"]["name"], "super snake");

    // New file version bumps current_version and stores new bytes.
    dev.send(
        "update_game",
        json!({ "game_id": game_id, "version": "2", "file_data": BASE64.encode(b"v2") }),
    )
    .await;
    assert_ok(&dev.recv().await);

    dev.send("download_game", json!({ "game_id": game_id })).await;
    let download = dev
        .recv_until(|m| m.get("action").and_then(Value::as_str) == Some("download_game"))
        .await;
    assert_eq!(download["version"], "2");
    assert_eq!(
        BASE64.decode(download["file_data"].as_str().unwrap()).unwrap(),
        b"v2"
    );

    // The old version stays downloadable.
    dev.send(
        "download_game",
        json!({ "game_id": game_id, "version": "1" }),
    )
    .await;
    let download = dev
        .recv_until(|m| m.get("action").and_then(Value::as_str) == Some("download_game"))
        .await;
    assert_eq!(
        BASE64.decode(download["file_data"].as_str().unwrap()).unwrap(),
        b"v1"
    );
}

#[tokio::test]
async fn upload_validation() {
    let dir = tempfile::tempdir().unwrap();
    let lobby = spawn_lobby(dir.path()).await;

    let mut dev = logged_in(lobby, "dev", true).await;

    dev.send("upload_game", json!({ "name": "x", "version": "1" }))
        .await;
    assert_error(&dev.recv().await, "missing_fields");

    dev.send(
        "upload_game",
        json!({ "name": "x", "version": "1", "file_data": "@@not-base64@@" }),
    )
    .await;
    assert_error(&dev.recv().await, "invalid_file_data");

    dev.send(
        "upload_game",
        json!({ "name": "x", "version": "../v1", "file_data": BASE64.encode(b"d") }),
    )
    .await;
    assert_error(&dev.recv().await, "invalid_version");

    dev.send("download_game", json!({ "game_id": 404 })).await;
    assert_error(&dev.recv().await, "game_not_found");
}

#[tokio::test]
async fn list_my_games_shows_only_the_callers() {
    let dir = tempfile::tempdir().unwrap();
    let lobby = spawn_lobby(dir.path()).await;

    let mut dev_a = logged_in(lobby, "ada", true).await;
    let mut dev_b = logged_in(lobby, "bea", true).await;

    dev_a
        .send(
            "upload_game",
            json!({ "name": "alpha", "version": "1", "file_data": BASE64.encode(b"a") }),
        )
        .await;
    assert_ok(&dev_a.recv().await);
    dev_b
        .send(
            "upload_game",
            json!({ "name": "beta", "version": "1", "file_data": BASE64.encode(b"b") }),
        )
        .await;
    assert_ok(&dev_b.recv().await);

    dev_a.send("list_my_games", Value::Null).await;
    let mine = dev_a.recv_until(|m| m.get("games").is_some()).await;
    let games = mine["games"].as_array().unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0]["name"], "alpha");
}

#[tokio::test]
async fn query_gamelogs_round_trips_through_the_lobby() {
    let dir = tempfile::tempdir().unwrap();
    let storage_addr = spawn_storage(dir.path()).await;
    let lobby = spawn_lobby_with(test_config(storage_addr, dir.path())).await;

    // Seed a finished match directly in storage, the way a match service
    // would.
    let storage = arcadia_server::storage::StorageClient::new(storage_addr.to_string());
    let entry: arcadia_server::storage::models::GameLogEntry = serde_json::from_value(json!({
        "matchid": "m123",
        "users": ["alice", "bob"],
        "results": [
            { "userId": "alice", "score": 500, "lines": 4 },
            { "userId": "bob", "score": 300, "lines": 2 },
        ],
        "winner": "P1",
        "reason": "time_up",
        "start_time": "2026-08-01T12:00:00Z",
        "end_time": "2026-08-01T12:01:00Z",
    }))
    .unwrap();
    storage.create_game_log(&entry).await.unwrap();

    let mut alice = logged_in(lobby, "alice", false).await;
    alice
        .send("query_gamelogs", json!({ "userId": "alice" }))
        .await;
    let reply = alice.recv_push("gamelog_response").await;
    let logs = reply["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["users"], json!(["alice", "bob"]));
    assert_eq!(logs[0]["winner"], "P1");
    assert_eq!(logs[0]["reason"], "time_up");
}
