//! Match launch and handoff.
//!
//! `start_game` flips the room to `playing` under both locks, then, with
//! no locks held, picks a port, resolves the game artifact, spawns the
//! match service, probes it for readiness, and hands both players the
//! endpoint. The transition is irreversible from the lobby's side until
//! the match service reports `game_over`.

use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;

use super::{ClientConn, LobbyServer};
use crate::artifacts;
use crate::net;
use crate::protocol::validation::int_field;
use crate::protocol::{framing, Push, Reason, Reply, RoomStatus, SessionStatus};

impl LobbyServer {
    /// `start_game`: host of a full idle room only.
    pub(crate) async fn handle_start_game(&self, conn: &ClientConn, username: &str) {
        let room_id;
        let player1;
        let player2;
        let game_id;
        let game_name;
        let p1_sender;
        let p2_sender;

        {
            let mut sessions = self.sessions.lock().await;
            let Some(id) = sessions.get(username).and_then(|s| s.status.room_id()) else {
                conn.send(&Reply::error(Reason::NotInARoom)).await;
                return;
            };
            room_id = id;

            let mut rooms = self.rooms.lock().await;
            let Some(room) = rooms.get_mut(&room_id) else {
                conn.send(&Reply::error(Reason::RoomNotFound)).await;
                return;
            };
            if room.host != username {
                conn.send(&Reply::error(Reason::NotRoomHost)).await;
                return;
            }
            if room.status != RoomStatus::Idle {
                conn.send(&Reply::error(Reason::RoomIsPlaying)).await;
                return;
            }
            if room.players.len() != 2 {
                conn.send(&Reply::error(Reason::RoomNotFull)).await;
                return;
            }

            // Point of no return: the room and both players are committed
            // until the match service sends game_over.
            room.status = RoomStatus::Playing;
            player1 = room.players[0].clone();
            player2 = room.players[1].clone();
            game_id = room.game_id;
            game_name = room.game_name.clone();

            p1_sender = sessions.get_mut(&player1).map(|s| {
                s.status = SessionStatus::Playing;
                s.sender.clone()
            });
            p2_sender = sessions.get_mut(&player2).map(|s| {
                s.status = SessionStatus::Playing;
                s.sender.clone()
            });
        }

        for player in [&player1, &player2] {
            if let Err(reason) = self.storage.update_user_status(player, "playing").await {
                tracing::warn!(user = %player, %reason, "failed to persist playing status");
            }
        }

        let port = match net::find_free_port(self.config.game.start_port) {
            Ok(port) => port,
            Err(e) => {
                tracing::error!(room_id, error = %e, "no free port for match service");
                return;
            }
        };

        let command = self.resolve_game_command(game_id).await;
        let Some((program, prefix_args)) = command.split_first() else {
            tracing::error!(room_id, "no launch command configured for match service");
            return;
        };
        tracing::info!(
            room_id,
            game = game_name.as_deref().unwrap_or("default"),
            ?command,
            port,
            p1 = %player1,
            p2 = %player2,
            "launching match service"
        );

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(prefix_args)
            .arg("--mode")
            .arg("server")
            .arg("--port")
            .arg(port.to_string())
            .arg("--p1")
            .arg(&player1)
            .arg("--p2")
            .arg(&player2)
            .arg("--room_id")
            .arg(room_id.to_string())
            .stdin(Stdio::null());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(room_id, error = %e, "failed to spawn match service");
                return;
            }
        };

        // Reap the child and record how the match process exited.
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => tracing::info!(room_id, %status, "match service exited"),
                Err(e) => tracing::warn!(room_id, error = %e, "failed to wait on match service"),
            }
        });

        let probe_addr = format!("{}:{}", self.config.lobby.host, port);
        let ready = net::probe_ready(
            &probe_addr,
            Duration::from_secs(self.config.game.ready_timeout_secs),
            Duration::from_millis(self.config.game.ready_poll_ms),
        )
        .await;
        if !ready {
            tracing::warn!(room_id, port, "match service not confirmed ready, proceeding anyway");
        }

        let push = Push::GameStart {
            host: self.config.lobby.host.clone(),
            port,
            room_id,
        };
        if let Ok(frame) = framing::encode(&push) {
            for sender in [p1_sender, p2_sender].into_iter().flatten() {
                if let Err(e) = sender.try_send(frame.clone()) {
                    tracing::warn!(room_id, error = %e, "failed to push GAME_START");
                }
            }
        }
    }

    /// Resolve the command that serves this room's game: the stored
    /// artifact if it is executable, otherwise the configured default.
    async fn resolve_game_command(&self, game_id: Option<u64>) -> Vec<String> {
        if let Some(id) = game_id {
            match self.artifact_path(id).await {
                Ok(path) => {
                    if artifacts::is_executable(std::path::Path::new(&path)) {
                        return vec![path];
                    }
                    tracing::warn!(
                        game_id = id,
                        %path,
                        "artifact is not executable, falling back to default game"
                    );
                }
                Err(reason) => {
                    tracing::warn!(game_id = id, %reason, "artifact unresolved, falling back to default game");
                }
            }
        }
        self.config.game.default_command.clone()
    }

    async fn artifact_path(&self, game_id: u64) -> Result<String, Reason> {
        let game = self.storage.query_game(game_id).await?;
        let version = self
            .storage
            .query_version(game_id, game.current_version.as_deref())
            .await?;
        if !std::path::Path::new(&version.file_path).exists() {
            return Err(Reason::FileNotFound);
        }
        Ok(version.file_path)
    }

    /// `game_over{room_id}` from a match service: delete the room, put both
    /// players back online, and refresh everyone's room and user lists.
    pub(crate) async fn handle_game_over(&self, data: &Value) {
        let Some(room_id) = int_field(data, "room_id") else {
            return;
        };

        let players = {
            let mut sessions = self.sessions.lock().await;
            let mut rooms = self.rooms.lock().await;

            let playing = rooms
                .get(&room_id)
                .is_some_and(|room| room.status == RoomStatus::Playing);
            if !playing {
                tracing::warn!(room_id, "game_over for a room that is not playing");
                return;
            }

            let room = rooms.remove(&room_id);
            let players: Vec<String> = room.map(|r| r.players).unwrap_or_default();
            for player in &players {
                if let Some(session) = sessions.get_mut(player.as_str()) {
                    session.status = SessionStatus::Online;
                }
            }
            players
        };

        tracing::info!(room_id, ?players, "game over, room closed");

        for player in &players {
            if let Err(reason) = self.storage.update_user_status(player, "online").await {
                tracing::warn!(user = %player, %reason, "failed to persist online status");
            }
        }

        self.broadcast_room_list().await;
        let users = self.user_list().await;
        self.broadcast_all(&Reply::ok().with_field("users", super::to_json(&users)))
            .await;
    }
}
