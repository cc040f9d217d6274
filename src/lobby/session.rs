//! Session lifecycle: register, login, logout, and disconnect cleanup.
//!
//! The worker is pre-auth until `login` succeeds; the disconnect path runs
//! the same teardown as an explicit logout, so a dropped TCP connection can
//! never leave a ghost session or a stuck idle room behind.

use serde_json::Value;

use super::{ClientConn, LobbyServer, Session};
use crate::protocol::validation::str_field;
use crate::protocol::{Reason, Reply, SessionStatus};

impl LobbyServer {
    /// `register`: forward to storage and return its verdict verbatim.
    pub(crate) async fn handle_register(&self, data: &Value) -> Reply {
        let Some(username) = str_field(data, &["user", "username"]) else {
            return Reply::error(Reason::MissingFields);
        };
        let Some(password) = str_field(data, &["pass", "password"]) else {
            return Reply::error(Reason::MissingFields);
        };
        let is_developer = data
            .get("is_developer")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        match self
            .storage
            .create_user(username, password, is_developer)
            .await
        {
            Ok(()) => {
                tracing::info!(user = username, "registered");
                Reply::ok()
            }
            Err(reason) => Reply::error(reason),
        }
    }

    /// `login`: validate against storage, claim the username in the session
    /// table, and reply with the user profile. Returns the username on
    /// success so the worker enters the authenticated phase.
    pub(crate) async fn handle_login(&self, conn: &ClientConn, data: &Value) -> Option<String> {
        let Some(username) = str_field(data, &["user", "username"]).map(str::to_string) else {
            conn.send(&Reply::error(Reason::MissingFields)).await;
            return None;
        };
        let Some(password) = str_field(data, &["pass", "password"]).map(str::to_string) else {
            conn.send(&Reply::error(Reason::MissingFields)).await;
            return None;
        };

        // Cheap pre-check; the insert below re-checks, so two racing logins
        // cannot both claim the name.
        {
            let sessions = self.sessions.lock().await;
            if sessions.contains_key(&username) {
                conn.send(&Reply::error(Reason::AlreadyLoggedIn)).await;
                return None;
            }
        }

        let profile = match self.storage.verify_user(&username, &password).await {
            Ok(profile) => profile,
            Err(reason) => {
                tracing::warn!(user = %username, %reason, "login rejected");
                conn.send(&Reply::error(reason)).await;
                return None;
            }
        };

        {
            let mut sessions = self.sessions.lock().await;
            if sessions.contains_key(&username) {
                conn.send(&Reply::error(Reason::AlreadyLoggedIn)).await;
                return None;
            }
            sessions.insert(
                username.clone(),
                Session {
                    addr: conn.addr,
                    sender: conn.sender.clone(),
                    status: SessionStatus::Online,
                },
            );
        }

        // Best-effort; a stale persisted status never blocks a login.
        if let Err(reason) = self.storage.update_user_status(&username, "online").await {
            tracing::warn!(user = %username, %reason, "failed to persist online status");
        }

        tracing::info!(user = %username, addr = %conn.addr, "logged in");
        conn.send(
            &Reply::ok()
                .with_reason("login_successful")
                .with_field("user", super::to_json(&profile)),
        )
        .await;
        Some(username)
    }

    /// Logout teardown, shared by the `logout` action (`farewell` = true)
    /// and the disconnect path (`farewell` = false): drop the session,
    /// persist `offline`, leave any idle room, discard pending invites.
    pub(crate) async fn finish_session(&self, username: &str, farewell: bool) {
        let removed = {
            let mut sessions = self.sessions.lock().await;
            sessions.remove(username)
        };
        let Some(session) = removed else {
            return;
        };
        tracing::info!(user = username, "logged out");

        if let Err(reason) = self.storage.update_user_status(username, "offline").await {
            tracing::warn!(user = username, %reason, "failed to persist offline status");
        }

        match session.status {
            // A playing room belongs to its match service; the lobby keeps
            // its hands off until game_over arrives.
            SessionStatus::Playing => {}
            SessionStatus::InRoom(_) | SessionStatus::Online => {
                self.handle_leave_room_for(username, session.status.room_id())
                    .await;
            }
        }

        {
            let mut invites = self.invites.lock().await;
            invites.remove(username);
        }

        if farewell {
            if let Ok(frame) =
                crate::protocol::framing::encode(&Reply::ok().with_reason("logout_successful"))
            {
                session.push(&frame);
            }
        }
    }
}
