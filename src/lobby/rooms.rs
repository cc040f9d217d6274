//! Room coordination: create, join, leave, invite, and the list views.
//!
//! Every mutation is atomic under the session and room locks, acquired in
//! that order (invites third when needed). Pushes to room members are
//! enqueued while the locks are held so `ROOM_UPDATE` order matches
//! mutation order; the global list broadcasts go out after release.

use serde_json::Value;
use std::collections::HashMap;

use super::{ClientConn, Invite, LobbyServer, Room, Session};
use crate::protocol::validation::{int_field, str_field};
use crate::protocol::{framing, Push, Reason, Reply, RoomStatus, SessionStatus};

/// Reason shown to players removed when their host leaves.
const HOST_LEFT: &str = "The host has left the room.";

impl LobbyServer {
    /// `create_room{name?, game_id?, is_public?}`.
    pub(crate) async fn handle_create_room(&self, conn: &ClientConn, username: &str, data: &Value) {
        let room_name = str_field(data, &["name"])
            .map_or_else(|| format!("{username}'s Room"), str::to_string);
        let game_id = int_field(data, "game_id");
        let is_public = data
            .get("is_public")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        // Resolve the game name before taking any lock; an unknown game is
        // a warning, not an error.
        let game_name = match game_id {
            Some(id) => match self.storage.query_game(id).await {
                Ok(game) => Some(game.name),
                Err(reason) => {
                    tracing::warn!(game_id = id, %reason, "creating room without game name");
                    None
                }
            },
            None => None,
        };

        let room_id = self.next_room_id();
        {
            let mut sessions = self.sessions.lock().await;
            let Some(session) = sessions.get_mut(username) else {
                conn.send(&Reply::error(Reason::SessionExpired)).await;
                return;
            };
            if session.status != SessionStatus::Online {
                conn.send(&Reply::error(Reason::AlreadyInARoom)).await;
                return;
            }

            let mut rooms = self.rooms.lock().await;
            let room = Room {
                id: room_id,
                name: room_name.clone(),
                host: username.to_string(),
                players: vec![username.to_string()],
                status: RoomStatus::Idle,
                game_id,
                game_name: game_name.clone(),
                is_public,
            };
            session.status = SessionStatus::InRoom(room_id);
            if let Ok(frame) = framing::encode(&room.update_push()) {
                session.push(&frame);
            }
            rooms.insert(room_id, room);
        }

        tracing::info!(
            user = username,
            room_id,
            name = %room_name,
            game = game_name.as_deref().unwrap_or("-"),
            is_public,
            "created room"
        );

        if is_public {
            self.broadcast_room_list().await;
        }
    }

    /// `join_room{room_id}`.
    pub(crate) async fn handle_join_room(&self, conn: &ClientConn, username: &str, data: &Value) {
        let Some(room_id) = int_field(data, "room_id") else {
            conn.send(&Reply::error(Reason::InvalidField("room_id".into())))
                .await;
            return;
        };

        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get(username) else {
            conn.send(&Reply::error(Reason::SessionExpired)).await;
            return;
        };
        if session.status != SessionStatus::Online {
            conn.send(&Reply::error(Reason::AlreadyInARoom)).await;
            return;
        }

        let mut rooms = self.rooms.lock().await;
        let Some(room) = rooms.get_mut(&room_id) else {
            conn.send(&Reply::error(Reason::RoomNotFound)).await;
            return;
        };
        if room.status != RoomStatus::Idle {
            conn.send(&Reply::error(Reason::RoomIsPlaying)).await;
            return;
        }

        if !room.is_public {
            // Private rooms need a matching invite, consumed exactly once.
            let mut invites = self.invites.lock().await;
            let entry = invites.entry(username.to_string()).or_default();
            let had_invite = entry.iter().any(|invite| invite.room_id == room_id);
            if !had_invite && !room.players.iter().any(|p| p == username) {
                conn.send(&Reply::error(Reason::RoomIsPrivateNotInvited))
                    .await;
                return;
            }
            entry.retain(|invite| invite.room_id != room_id);
        }

        if room.players.len() >= 2 {
            conn.send(&Reply::error(Reason::RoomIsFull)).await;
            return;
        }

        room.players.push(username.to_string());
        if let Some(session) = sessions.get_mut(username) {
            session.status = SessionStatus::InRoom(room_id);
        }
        tracing::info!(user = username, room_id, "joined room");

        push_to_members(&sessions, &room.players, &room.update_push());
    }

    /// `leave_room` from a live session.
    pub(crate) async fn handle_leave_room(&self, username: &str) {
        let room_id = {
            let sessions = self.sessions.lock().await;
            sessions.get(username).and_then(|s| s.status.room_id())
        };
        self.handle_leave_room_for(username, room_id).await;
    }

    /// Shared leave sequence, also used by the disconnect path after the
    /// session entry is already gone.
    pub(crate) async fn handle_leave_room_for(&self, username: &str, room_id: Option<u64>) {
        let Some(room_id) = room_id else {
            return;
        };

        let public_changed = {
            let mut sessions = self.sessions.lock().await;
            let mut rooms = self.rooms.lock().await;
            leave_room_locked(&mut sessions, &mut rooms, username, room_id)
        };

        if public_changed {
            self.broadcast_room_list().await;
        }
    }

    /// `invite{target_user}`.
    pub(crate) async fn handle_invite(&self, conn: &ClientConn, username: &str, data: &Value) {
        let Some(target) = str_field(data, &["target_user"]).map(str::to_string) else {
            conn.send(&Reply::error(Reason::MissingFields)).await;
            return;
        };
        if target == username {
            conn.send(&Reply::error(Reason::CannotInviteSelf)).await;
            return;
        }

        let target_frame;
        {
            let sessions = self.sessions.lock().await;
            let Some(room_id) = sessions.get(username).and_then(|s| s.status.room_id()) else {
                conn.send(&Reply::error(Reason::NotInARoom)).await;
                return;
            };

            let Some(target_session) = sessions.get(&target) else {
                conn.send(&Reply::error(Reason::UserNotOnline)).await;
                return;
            };
            if target_session.status != SessionStatus::Online {
                conn.send(&Reply::error(Reason::UserIsBusy)).await;
                return;
            }

            let rooms = self.rooms.lock().await;
            let game_name = rooms.get(&room_id).and_then(|room| room.game_name.clone());

            let mut invites = self.invites.lock().await;
            let entry = invites.entry(target.clone()).or_default();
            // Re-inviting to the same room replaces the pending invite.
            entry.retain(|invite| invite.room_id != room_id);
            entry.push(Invite {
                from: username.to_string(),
                room_id,
                game_name: game_name.clone(),
            });

            target_frame = framing::encode(&Push::InviteReceived {
                from_user: username.to_string(),
                room_id,
                game_name,
            })
            .ok();
            if let Some(frame) = &target_frame {
                target_session.push(frame);
            }
            tracing::info!(from = username, to = %target, room_id, "invite sent");
        }

        conn.send(&Reply::ok().with_reason("invite_sent")).await;
    }

    /// `query_gamelogs{userId?}`: forwarded to storage, answered as a
    /// `gamelog_response` message.
    pub(crate) async fn handle_query_gamelogs(&self, conn: &ClientConn, data: &Value) {
        let user_id = str_field(data, &["userId"]);
        match self.storage.query_game_logs(user_id).await {
            Ok(logs) => conn.send(&Push::GamelogResponse { logs }).await,
            Err(reason) => conn.send(&Reply::error(reason)).await,
        }
    }
}

/// Remove `username` from an idle room under both locks. When the host
/// leaves, remaining players are kicked and the room is deleted. Returns
/// whether the public room list changed.
pub(super) fn leave_room_locked(
    sessions: &mut HashMap<String, Session>,
    rooms: &mut HashMap<u64, Room>,
    username: &str,
    room_id: u64,
) -> bool {
    if let Some(session) = sessions.get_mut(username) {
        session.status = SessionStatus::Online;
    }

    let Some(room) = rooms.get_mut(&room_id) else {
        return false;
    };
    // A playing room belongs to its match service until game_over.
    if room.status == RoomStatus::Playing {
        return false;
    }

    room.players.retain(|p| p != username);
    let was_host = room.host == username;
    let is_public = room.is_public;

    if was_host || room.players.is_empty() {
        let remaining = room.players.clone();
        tracing::info!(user = username, room_id, ?remaining, "host left, closing room");
        if let Ok(frame) = framing::encode(&Push::KickedFromRoom {
            reason: HOST_LEFT.to_string(),
        }) {
            for player in &remaining {
                if let Some(session) = sessions.get_mut(player.as_str()) {
                    session.push(&frame);
                    session.status = SessionStatus::Online;
                }
            }
        }
        rooms.remove(&room_id);
    } else {
        tracing::info!(user = username, room_id, "left room");
        let push = room.update_push();
        let members = room.players.clone();
        push_to_members(sessions, &members, &push);
    }

    is_public
}

/// Encode once and enqueue to each named member's writer queue.
pub(super) fn push_to_members(
    sessions: &HashMap<String, Session>,
    members: &[String],
    push: &Push,
) {
    let Ok(frame) = framing::encode(push) else {
        return;
    };
    for member in members {
        if let Some(session) = sessions.get(member.as_str()) {
            session.push(&frame);
        }
    }
}
