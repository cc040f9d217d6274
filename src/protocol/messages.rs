use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::reason::Reason;
use super::types::{EndReason, PlayerResult, PlayerSlot, RoomStatus, Winner};
use crate::storage::models::GameLogRecord;

/// Request envelope common to every TCP link: `{action, data?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub action: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl Envelope {
    pub fn new(action: impl Into<String>, data: Value) -> Self {
        Self {
            action: action.into(),
            data,
        }
    }
}

/// Storage-service request: `{collection, action, data?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageRequest {
    pub collection: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl StorageRequest {
    pub fn new(collection: &str, action: &str, data: Value) -> Self {
        Self {
            collection: collection.to_string(),
            action: action.to_string(),
            data,
        }
    }
}

/// Response status discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// Response envelope: `{status, reason?, ...payload}`.
///
/// The payload fields sit flat beside `status`, matching what clients
/// expect; typed payload structs are flattened in via [`Reply::ok_with`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Reply {
    pub fn ok() -> Self {
        Self {
            status: Status::Ok,
            reason: None,
            body: Map::new(),
        }
    }

    /// An `ok` reply whose payload fields come from `payload`'s own fields.
    pub fn ok_with<T: Serialize>(payload: &T) -> Self {
        let body = match serde_json::to_value(payload) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => Map::new(),
        };
        Self {
            status: Status::Ok,
            reason: None,
            body,
        }
    }

    pub fn error(reason: Reason) -> Self {
        Self {
            status: Status::Error,
            reason: Some(reason.to_string()),
            body: Map::new(),
        }
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }

    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.body.insert(key.to_string(), value);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// The error reason mapped into the shared taxonomy. `None` for `ok`.
    pub fn reason(&self) -> Option<Reason> {
        match self.status {
            Status::Ok => None,
            Status::Error => Some(
                self.reason
                    .as_deref()
                    .map_or(Reason::InternalServerError, Reason::from_token),
            ),
        }
    }

    /// Deserialize the flattened payload fields into a typed struct.
    pub fn parse_body<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.body.clone()))
    }
}

/// Unsolicited lobby-to-client pushes, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Push {
    #[serde(rename = "ROOM_UPDATE")]
    RoomUpdate {
        room_id: u64,
        name: String,
        players: Vec<String>,
        host: String,
        game_id: Option<u64>,
        game_name: Option<String>,
        is_public: bool,
        status: RoomStatus,
    },
    #[serde(rename = "KICKED_FROM_ROOM")]
    KickedFromRoom { reason: String },
    #[serde(rename = "INVITE_RECEIVED")]
    InviteReceived {
        from_user: String,
        room_id: u64,
        game_name: Option<String>,
    },
    #[serde(rename = "GAME_START")]
    GameStart {
        host: String,
        port: u16,
        room_id: u64,
    },
    #[serde(rename = "GAME_DELETED")]
    GameDeleted { game_id: u64 },
    #[serde(rename = "gamelog_response")]
    GamelogResponse { logs: Vec<GameLogRecord> },
}

/// Messages a match service sends to its two clients, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MatchServerMessage {
    #[serde(rename = "WELCOME")]
    Welcome {
        role: PlayerSlot,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seed: Option<u64>,
    },
    #[serde(rename = "SNAPSHOT")]
    Snapshot {
        #[serde(flatten)]
        state: Map<String, Value>,
    },
    #[serde(rename = "GAME_OVER")]
    GameOver {
        winner: Winner,
        winner_username: String,
        loser_username: Option<String>,
        reason: EndReason,
        p1_results: PlayerResult,
        p2_results: PlayerResult,
        room_id: u64,
    },
}

/// Messages a client sends to a match service, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MatchClientMessage {
    #[serde(rename = "INPUT")]
    Input { action: String },
    #[serde(rename = "FORFEIT")]
    Forfeit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_tolerates_missing_data() {
        let env: Envelope = serde_json::from_str(r#"{"action":"logout"}"#).unwrap();
        assert_eq!(env.action, "logout");
        assert!(env.data.is_null());
    }

    #[test]
    fn reply_payload_sits_flat_beside_status() {
        #[derive(Serialize)]
        struct Payload {
            game_id: u64,
            version: String,
        }
        let reply = Reply::ok_with(&Payload {
            game_id: 7,
            version: "1.0.0".into(),
        })
        .with_reason("game_uploaded");
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["reason"], "game_uploaded");
        assert_eq!(json["game_id"], 7);
        assert_eq!(json["version"], "1.0.0");
    }

    #[test]
    fn error_reply_carries_the_token() {
        let reply = Reply::error(Reason::RoomIsFull);
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["reason"], "room_is_full");
        assert_eq!(reply.reason(), Some(Reason::RoomIsFull));
    }

    #[test]
    fn push_tags_match_the_wire_protocol() {
        let push = Push::GameStart {
            host: "127.0.0.1".into(),
            port: 7801,
            room_id: 100,
        };
        let json = serde_json::to_value(&push).unwrap();
        assert_eq!(json["type"], "GAME_START");
        assert_eq!(json["port"], 7801);

        let push = Push::KickedFromRoom {
            reason: "The host has left the room.".into(),
        };
        assert_eq!(
            serde_json::to_value(&push).unwrap()["type"],
            "KICKED_FROM_ROOM"
        );
    }

    #[test]
    fn snapshot_state_is_flattened() {
        let msg = MatchServerMessage::Snapshot {
            state: json!({"remaining_time": 42})
                .as_object()
                .cloned()
                .unwrap(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "SNAPSHOT");
        assert_eq!(json["remaining_time"], 42);
    }

    #[test]
    fn client_messages_round_trip() {
        let input: MatchClientMessage =
            serde_json::from_str(r#"{"type":"INPUT","action":"MOVE_LEFT"}"#).unwrap();
        assert!(matches!(input, MatchClientMessage::Input { ref action } if action == "MOVE_LEFT"));
        let forfeit: MatchClientMessage = serde_json::from_str(r#"{"type":"FORFEIT"}"#).unwrap();
        assert!(matches!(forfeit, MatchClientMessage::Forfeit));
    }
}
