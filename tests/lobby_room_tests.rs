//! Room coordination over real sockets: create, join, leave, invites, the
//! start_game transition, and game_over recovery.

mod test_helpers;

use serde_json::{json, Value};
use test_helpers::{assert_error, assert_ok, spawn_lobby, TestClient};

async fn logged_in(lobby: std::net::SocketAddr, name: &str) -> TestClient {
    let mut client = TestClient::connect(lobby).await;
    assert_ok(&client.register(name, "pw").await);
    assert_ok(&client.login(name, "pw").await);
    client
}

#[tokio::test]
async fn create_and_join_full_path() {
    let dir = tempfile::tempdir().unwrap();
    let lobby = spawn_lobby(dir.path()).await;

    let mut alice = logged_in(lobby, "alice").await;
    let mut bob = logged_in(lobby, "bob").await;

    alice
        .send("create_room", json!({ "name": "duel", "is_public": true }))
        .await;
    let update = alice.recv_push("ROOM_UPDATE").await;
    let room_id = update["room_id"].as_u64().unwrap();
    assert_eq!(update["players"], json!(["alice"]));
    assert_eq!(update["host"], "alice");
    assert_eq!(update["status"], "idle");

    // Public rooms refresh everyone's list.
    let broadcast = bob.recv_until(|m| m.get("rooms").is_some()).await;
    assert_eq!(broadcast["rooms"][0]["name"], "duel");
    assert_eq!(broadcast["rooms"][0]["players"], 1);

    bob.send("join_room", json!({ "room_id": room_id })).await;
    let bob_update = bob.recv_push("ROOM_UPDATE").await;
    assert_eq!(bob_update["players"], json!(["alice", "bob"]));
    let alice_update = alice.recv_push("ROOM_UPDATE").await;
    assert_eq!(alice_update["players"], json!(["alice", "bob"]));

    // A third player bounces off the full room.
    let mut carol = logged_in(lobby, "carol").await;
    carol.send("join_room", json!({ "room_id": room_id })).await;
    assert_error(
        &carol.recv_error().await,
        "room_is_full",
    );
}

#[tokio::test]
async fn join_errors() {
    let dir = tempfile::tempdir().unwrap();
    let lobby = spawn_lobby(dir.path()).await;

    let mut alice = logged_in(lobby, "alice").await;
    alice.send("join_room", json!({ "room_id": 999 })).await;
    assert_error(&alice.recv().await, "room_not_found");

    alice.send("join_room", json!({ "room_id": "abc" })).await;
    assert_error(&alice.recv().await, "invalid_room_id");

    // Creating while already in a room.
    alice.send("create_room", json!({})).await;
    alice.recv_push("ROOM_UPDATE").await;
    alice.send("create_room", json!({})).await;
    assert_error(
        &alice.recv_error().await,
        "already_in_a_room",
    );
}

#[tokio::test]
async fn start_game_requires_host_and_full_room() {
    let dir = tempfile::tempdir().unwrap();
    let lobby = spawn_lobby(dir.path()).await;

    let mut alice = logged_in(lobby, "alice").await;
    let mut bob = logged_in(lobby, "bob").await;

    alice.send("create_room", json!({})).await;
    let update = alice.recv_push("ROOM_UPDATE").await;
    let room_id = update["room_id"].as_u64().unwrap();

    // One player is not enough.
    alice.send("start_game", Value::Null).await;
    assert_error(
        &alice.recv_error().await,
        "room_not_full",
    );

    bob.send("join_room", json!({ "room_id": room_id })).await;
    bob.recv_push("ROOM_UPDATE").await;

    // Only the host may start.
    bob.send("start_game", Value::Null).await;
    assert_error(
        &bob.recv_error().await,
        "not_room_host",
    );

    // Outside a room entirely.
    let mut carol = logged_in(lobby, "carol").await;
    carol.send("start_game", Value::Null).await;
    assert_error(
        &carol.recv_error().await,
        "not_in_a_room",
    );
}

#[tokio::test]
async fn host_disconnect_kicks_and_deletes_the_room() {
    let dir = tempfile::tempdir().unwrap();
    let lobby = spawn_lobby(dir.path()).await;

    let mut alice = logged_in(lobby, "alice").await;
    let mut bob = logged_in(lobby, "bob").await;

    alice.send("create_room", json!({ "name": "doomed" })).await;
    let update = alice.recv_push("ROOM_UPDATE").await;
    let room_id = update["room_id"].as_u64().unwrap();
    bob.send("join_room", json!({ "room_id": room_id })).await;
    bob.recv_push("ROOM_UPDATE").await;

    // The host's TCP connection drops.
    drop(alice);

    let kicked = bob.recv_push("KICKED_FROM_ROOM").await;
    assert_eq!(kicked["reason"], "The host has left the room.");

    // Bob is back online and the room is gone.
    bob.send("list_users", Value::Null).await;
    let users = bob.recv_until(|m| m.get("users").is_some()).await;
    let bob_row = users["users"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["username"] == "bob")
        .unwrap()
        .clone();
    assert_eq!(bob_row["status"], "online");

    bob.send("list_rooms", Value::Null).await;
    let rooms = bob.recv_until(|m| m.get("rooms").is_some()).await;
    assert!(rooms["rooms"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn non_host_leave_updates_the_room() {
    let dir = tempfile::tempdir().unwrap();
    let lobby = spawn_lobby(dir.path()).await;

    let mut alice = logged_in(lobby, "alice").await;
    let mut bob = logged_in(lobby, "bob").await;

    alice.send("create_room", json!({})).await;
    let update = alice.recv_push("ROOM_UPDATE").await;
    let room_id = update["room_id"].as_u64().unwrap();
    bob.send("join_room", json!({ "room_id": room_id })).await;
    bob.recv_push("ROOM_UPDATE").await;
    alice.recv_push("ROOM_UPDATE").await;

    bob.send("leave_room", Value::Null).await;
    let update = alice.recv_push("ROOM_UPDATE").await;
    assert_eq!(update["players"], json!(["alice"]));

    // Bob can immediately host his own room.
    bob.send("create_room", json!({})).await;
    let update = bob.recv_push("ROOM_UPDATE").await;
    assert_eq!(update["host"], "bob");
}

#[tokio::test]
async fn private_room_invite_flow() {
    let dir = tempfile::tempdir().unwrap();
    let lobby = spawn_lobby(dir.path()).await;

    let mut alice = logged_in(lobby, "alice").await;
    let mut bob = logged_in(lobby, "bob").await;
    let mut carol = logged_in(lobby, "carol").await;

    alice
        .send("create_room", json!({ "name": "secret", "is_public": false }))
        .await;
    let update = alice.recv_push("ROOM_UPDATE").await;
    let room_id = update["room_id"].as_u64().unwrap();

    // Private rooms never show up in listings.
    carol.send("list_rooms", Value::Null).await;
    let rooms = carol.recv_until(|m| m.get("rooms").is_some()).await;
    assert!(rooms["rooms"].as_array().unwrap().is_empty());

    // Uninvited join is rejected.
    carol.send("join_room", json!({ "room_id": room_id })).await;
    assert_error(
        &carol.recv_error().await,
        "room_is_private_not_invited",
    );

    alice.send("invite", json!({ "target_user": "bob" })).await;
    let reply = alice.recv_until(|m| m.get("status").is_some()).await;
    assert_ok(&reply);
    assert_eq!(reply["reason"], "invite_sent");

    let invite = bob.recv_push("INVITE_RECEIVED").await;
    assert_eq!(invite["from_user"], "alice");
    assert_eq!(invite["room_id"], room_id);

    bob.send("join_room", json!({ "room_id": room_id })).await;
    let update = bob.recv_push("ROOM_UPDATE").await;
    assert_eq!(update["players"], json!(["alice", "bob"]));

    // Leaving and re-joining without a fresh invite fails: the invite was
    // consumed exactly once.
    bob.send("leave_room", Value::Null).await;
    alice.recv_push("ROOM_UPDATE").await;
    bob.send("join_room", json!({ "room_id": room_id })).await;
    assert_error(
        &bob.recv_error().await,
        "room_is_private_not_invited",
    );
}

#[tokio::test]
async fn invite_error_paths() {
    let dir = tempfile::tempdir().unwrap();
    let lobby = spawn_lobby(dir.path()).await;

    let mut alice = logged_in(lobby, "alice").await;
    let mut bob = logged_in(lobby, "bob").await;
    let mut carol = logged_in(lobby, "carol").await;

    // Not in a room yet.
    alice.send("invite", json!({ "target_user": "bob" })).await;
    assert_error(&alice.recv().await, "not_in_a_room");

    alice.send("create_room", json!({ "is_public": false })).await;
    alice.recv_push("ROOM_UPDATE").await;

    alice.send("invite", json!({ "target_user": "alice" })).await;
    assert_error(&alice.recv().await, "cannot_invite_self");

    alice.send("invite", json!({ "target_user": "ghost" })).await;
    assert_error(&alice.recv().await, "user_not_online");

    // Busy target: bob sits in his own room.
    bob.send("create_room", json!({})).await;
    bob.recv_push("ROOM_UPDATE").await;
    alice.send("invite", json!({ "target_user": "bob" })).await;
    assert_error(
        &alice.recv_error().await,
        "user_is_busy",
    );

    // Carol is available.
    alice.send("invite", json!({ "target_user": "carol" })).await;
    let reply = alice.recv_until(|m| m.get("status").is_some()).await;
    assert_ok(&reply);
    carol.recv_push("INVITE_RECEIVED").await;
}

#[tokio::test]
async fn start_game_transition_and_game_over_recovery() {
    let dir = tempfile::tempdir().unwrap();
    let lobby = spawn_lobby(dir.path()).await;

    let mut alice = logged_in(lobby, "alice").await;
    let mut bob = logged_in(lobby, "bob").await;

    alice.send("create_room", json!({ "name": "arena" })).await;
    let update = alice.recv_push("ROOM_UPDATE").await;
    let room_id = update["room_id"].as_u64().unwrap();
    bob.send("join_room", json!({ "room_id": room_id })).await;
    bob.recv_push("ROOM_UPDATE").await;

    // The fixture's default game command points at nothing, so the spawn
    // fails after the transition; the room stays playing until game_over.
    alice.send("start_game", Value::Null).await;

    let mut carol = logged_in(lobby, "carol").await;
    for _ in 0..50 {
        carol.send("list_users", Value::Null).await;
        let users = carol.recv_until(|m| m.get("users").is_some()).await;
        let alice_status = users["users"]
            .as_array()
            .unwrap()
            .iter()
            .find(|u| u["username"] == "alice")
            .map(|u| u["status"].clone());
        if alice_status == Some(json!("playing")) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }

    // The playing room is hidden from listings.
    carol.send("list_rooms", Value::Null).await;
    let rooms = carol.recv_until(|m| m.get("rooms").is_some()).await;
    assert!(rooms["rooms"].as_array().unwrap().is_empty());

    // A playing room cannot be joined or started again.
    carol.send("join_room", json!({ "room_id": room_id })).await;
    assert_error(
        &carol.recv_error().await,
        "room_is_playing",
    );

    // The match service (here: a bare connection) reports game over.
    let mut reporter = TestClient::connect(lobby).await;
    reporter
        .send("game_over", json!({ "room_id": room_id }))
        .await;
    let reply = reporter.recv_until(|m| m.get("status").is_some()).await;
    assert_ok(&reply);
    assert_eq!(reply["reason"], "game_over_processed");

    // Everyone hears the refreshed lists; the players are online again.
    carol.send("list_users", Value::Null).await;
    let users = carol
        .recv_until(|m| {
            m.get("users").is_some_and(|users| {
                users
                    .as_array()
                    .is_some_and(|rows| rows.iter().all(|u| u["status"] == "online"))
            })
        })
        .await;
    assert_eq!(users["users"].as_array().unwrap().len(), 3);
}
