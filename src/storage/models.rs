use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::{EndReason, PlayerResult, Winner};

/// A registered user. The password hash never leaves the storage service;
/// wire responses use [`crate::protocol::UserProfile`] or [`UserView`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
    #[serde(default)]
    pub is_developer: bool,
    #[serde(default = "offline")]
    pub status: String,
    pub created_at: DateTime<Utc>,
}

fn offline() -> String {
    "offline".to_string()
}

/// Projection returned by `User.get`: everything except the hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    pub username: String,
    pub is_developer: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<&UserRecord> for UserView {
    fn from(user: &UserRecord) -> Self {
        Self {
            username: user.username.clone(),
            is_developer: user.is_developer,
            status: user.status.clone(),
            created_at: user.created_at,
        }
    }
}

/// A catalog entry for an uploaded game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: u64,
    pub name: String,
    pub author: String,
    #[serde(default)]
    pub description: String,
    pub current_version: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One uploaded artifact revision. Appended on upload/update, never
/// rewritten; `(game_id, version)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameVersionRecord {
    pub id: u64,
    pub game_id: u64,
    pub version: String,
    pub file_path: String,
    pub file_hash: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Payload accepted by `GameLog.create`: a [`GameLogRecord`] before the
/// storage service assigns its row id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameLogEntry {
    pub matchid: String,
    #[serde(default)]
    pub game_id: Option<u64>,
    pub users: Vec<String>,
    #[serde(default)]
    pub results: Vec<PlayerResult>,
    pub winner: Winner,
    pub reason: EndReason,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Immutable record of one completed match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameLogRecord {
    pub id: u64,
    pub matchid: String,
    pub game_id: Option<u64>,
    /// Participants in player order (P1 first).
    pub users: Vec<String>,
    pub results: Vec<PlayerResult>,
    pub winner: Winner,
    pub reason: EndReason,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_view_drops_the_hash() {
        let user = UserRecord {
            username: "alice".into(),
            password_hash: "$2b$12$secret".into(),
            is_developer: true,
            status: "online".into(),
            created_at: Utc::now(),
        };
        let view = UserView::from(&user);
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "alice");
        assert_eq!(json["is_developer"], true);
    }

    #[test]
    fn game_log_round_trips() {
        let log = GameLogRecord {
            id: 1,
            matchid: "match_abc".into(),
            game_id: Some(3),
            users: vec!["alice".into(), "bob".into()],
            results: vec![
                PlayerResult {
                    user_id: "alice".into(),
                    score: 500,
                    lines: 4,
                },
                PlayerResult {
                    user_id: "bob".into(),
                    score: 300,
                    lines: 2,
                },
            ],
            winner: Winner::P1,
            reason: EndReason::TimeUp,
            start_time: Utc::now(),
            end_time: Utc::now(),
        };
        let json = serde_json::to_string(&log).unwrap();
        let back: GameLogRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.matchid, "match_abc");
        assert_eq!(back.users, vec!["alice", "bob"]);
        assert_eq!(back.winner, Winner::P1);
    }
}
