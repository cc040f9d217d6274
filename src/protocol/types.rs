use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Compact per-user tag distinguishing what a session is doing without
/// consulting the room table. Wire form: `online`, `in_room_<N>`, `playing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Online,
    InRoom(u64),
    Playing,
}

impl SessionStatus {
    pub fn room_id(self) -> Option<u64> {
        match self {
            Self::InRoom(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => f.write_str("online"),
            Self::InRoom(id) => write!(f, "in_room_{id}"),
            Self::Playing => f.write_str("playing"),
        }
    }
}

impl FromStr for SessionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Self::Online),
            "playing" => Ok(Self::Playing),
            other => other
                .strip_prefix("in_room_")
                .and_then(|id| id.parse().ok())
                .map(Self::InRoom)
                .ok_or(()),
        }
    }
}

impl Serialize for SessionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SessionStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|()| serde::de::Error::custom(format!("invalid session status '{s}'")))
    }
}

/// Room lifecycle state as seen by the lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Idle,
    Playing,
}

/// Seat assignment inside a match. P1 is the first accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerSlot {
    P1,
    P2,
}

impl PlayerSlot {
    pub fn index(self) -> usize {
        match self {
            Self::P1 => 0,
            Self::P2 => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::P1 => Self::P2,
            Self::P2 => Self::P1,
        }
    }
}

impl fmt::Display for PlayerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::P1 => f.write_str("P1"),
            Self::P2 => f.write_str("P2"),
        }
    }
}

/// Match winner tag recorded in game logs and GAME_OVER messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    P1,
    P2,
    #[serde(rename = "TIE")]
    Tie,
}

impl Winner {
    pub fn slot(self) -> Option<PlayerSlot> {
        match self {
            Self::P1 => Some(PlayerSlot::P1),
            Self::P2 => Some(PlayerSlot::P2),
            Self::Tie => None,
        }
    }
}

impl From<PlayerSlot> for Winner {
    fn from(slot: PlayerSlot) -> Self {
        match slot {
            PlayerSlot::P1 => Self::P1,
            PlayerSlot::P2 => Self::P2,
        }
    }
}

/// Why a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    BoardFull,
    Forfeit,
    TimeUp,
    Tie,
    Disconnect,
    Win,
}

/// Per-player figures reported at match end and stored in game logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerResult {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub score: i64,
    pub lines: u32,
}

/// User projection returned to clients; never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub is_developer: bool,
}

/// One row of a `list_rooms` response: idle public rooms only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: u64,
    pub name: String,
    pub host: String,
    pub players: usize,
    pub game_id: Option<u64>,
    pub game_name: Option<String>,
}

/// One row of a `list_users` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub username: String,
    pub status: SessionStatus,
}
