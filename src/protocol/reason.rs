use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Machine-readable reason tokens carried in error responses.
///
/// The `Display` form of each variant is the exact wire token; clients
/// branch on these strings, so they are part of the protocol surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Reason {
    // Validation
    #[error("missing_fields")]
    MissingFields,
    #[error("missing_key:{0}")]
    MissingKey(String),
    #[error("invalid_{0}")]
    InvalidField(String),
    #[error("invalid_json_format")]
    InvalidJsonFormat,

    // Authorization
    #[error("invalid_credentials")]
    InvalidCredentials,
    #[error("must_be_logged_in")]
    MustBeLoggedIn,
    #[error("already_logged_in")]
    AlreadyLoggedIn,
    #[error("session_expired")]
    SessionExpired,
    #[error("not_developer")]
    NotDeveloper,
    #[error("not_game_owner")]
    NotGameOwner,

    // Resources
    #[error("user_not_found")]
    UserNotFound,
    #[error("user_exists")]
    UserExists,
    #[error("user_not_online")]
    UserNotOnline,
    #[error("user_is_busy")]
    UserIsBusy,
    #[error("cannot_invite_self")]
    CannotInviteSelf,
    #[error("game_not_found")]
    GameNotFound,
    #[error("version_not_found")]
    VersionNotFound,
    #[error("version_exists")]
    VersionExists,
    #[error("file_not_found")]
    FileNotFound,
    #[error("gamelog_already_exists")]
    GameLogAlreadyExists,
    #[error("room_not_found")]
    RoomNotFound,
    #[error("room_is_full")]
    RoomIsFull,
    #[error("room_is_playing")]
    RoomIsPlaying,
    #[error("room_is_private_not_invited")]
    RoomIsPrivateNotInvited,

    // Conflicts
    #[error("already_in_a_room")]
    AlreadyInARoom,
    #[error("not_in_a_room")]
    NotInARoom,
    #[error("not_room_host")]
    NotRoomHost,
    #[error("room_not_full")]
    RoomNotFull,

    // Downstream
    #[error("db_server_no_response")]
    DbServerNoResponse,
    #[error("db_server_connection_error")]
    DbServerConnectionError,
    #[error("internal_server_error")]
    InternalServerError,

    // Dispatch
    #[error("unknown_action")]
    UnknownAction,
    #[error("unknown_collection")]
    UnknownCollection,
}

impl Reason {
    /// Parse a wire token back into a [`Reason`].
    ///
    /// Handlers translate downstream storage errors into this taxonomy
    /// instead of forwarding raw text; anything unrecognized collapses to
    /// [`Reason::InternalServerError`].
    pub fn from_token(token: &str) -> Self {
        if let Some(name) = token.strip_prefix("missing_key:") {
            return Self::MissingKey(name.to_string());
        }
        match token {
            "missing_fields" => Self::MissingFields,
            "invalid_json_format" => Self::InvalidJsonFormat,
            "invalid_credentials" => Self::InvalidCredentials,
            "must_be_logged_in" => Self::MustBeLoggedIn,
            "already_logged_in" => Self::AlreadyLoggedIn,
            "session_expired" => Self::SessionExpired,
            "not_developer" => Self::NotDeveloper,
            "not_game_owner" => Self::NotGameOwner,
            "user_not_found" => Self::UserNotFound,
            "user_exists" => Self::UserExists,
            "user_not_online" => Self::UserNotOnline,
            "user_is_busy" => Self::UserIsBusy,
            "cannot_invite_self" => Self::CannotInviteSelf,
            "game_not_found" => Self::GameNotFound,
            "version_not_found" => Self::VersionNotFound,
            "version_exists" => Self::VersionExists,
            "file_not_found" => Self::FileNotFound,
            "gamelog_already_exists" => Self::GameLogAlreadyExists,
            "room_not_found" => Self::RoomNotFound,
            "room_is_full" => Self::RoomIsFull,
            "room_is_playing" => Self::RoomIsPlaying,
            "room_is_private_not_invited" => Self::RoomIsPrivateNotInvited,
            "already_in_a_room" => Self::AlreadyInARoom,
            "not_in_a_room" => Self::NotInARoom,
            "not_room_host" => Self::NotRoomHost,
            "room_not_full" => Self::RoomNotFull,
            "db_server_no_response" => Self::DbServerNoResponse,
            "db_server_connection_error" => Self::DbServerConnectionError,
            "unknown_action" => Self::UnknownAction,
            "unknown_collection" => Self::UnknownCollection,
            other => {
                if let Some(name) = other.strip_prefix("invalid_") {
                    Self::InvalidField(name.to_string())
                } else {
                    Self::InternalServerError
                }
            }
        }
    }
}

impl Serialize for Reason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Reason {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TokenVisitor;
        impl serde::de::Visitor<'_> for TokenVisitor {
            type Value = Reason;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a reason token string")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Reason, E> {
                Ok(Reason::from_token(v))
            }
        }
        deserializer.deserialize_str(TokenVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_stable_wire_strings() {
        assert_eq!(Reason::UserExists.to_string(), "user_exists");
        assert_eq!(Reason::RoomIsFull.to_string(), "room_is_full");
        assert_eq!(
            Reason::RoomIsPrivateNotInvited.to_string(),
            "room_is_private_not_invited"
        );
        assert_eq!(
            Reason::MissingKey("action".into()).to_string(),
            "missing_key:action"
        );
        assert_eq!(
            Reason::InvalidField("room_id".into()).to_string(),
            "invalid_room_id"
        );
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&Reason::GameLogAlreadyExists).unwrap();
        assert_eq!(json, "\"gamelog_already_exists\"");
    }

    #[test]
    fn round_trips_through_from_token() {
        let reasons = [
            Reason::MissingFields,
            Reason::MissingKey("collection".into()),
            Reason::InvalidField("game_id".into()),
            Reason::InvalidCredentials,
            Reason::MustBeLoggedIn,
            Reason::AlreadyLoggedIn,
            Reason::NotDeveloper,
            Reason::NotGameOwner,
            Reason::UserNotFound,
            Reason::UserExists,
            Reason::GameNotFound,
            Reason::VersionNotFound,
            Reason::VersionExists,
            Reason::FileNotFound,
            Reason::GameLogAlreadyExists,
            Reason::RoomNotFound,
            Reason::RoomIsFull,
            Reason::RoomIsPlaying,
            Reason::RoomIsPrivateNotInvited,
            Reason::AlreadyInARoom,
            Reason::NotInARoom,
            Reason::NotRoomHost,
            Reason::RoomNotFull,
            Reason::DbServerNoResponse,
            Reason::DbServerConnectionError,
            Reason::InternalServerError,
            Reason::UnknownAction,
            Reason::UnknownCollection,
        ];
        for reason in reasons {
            assert_eq!(Reason::from_token(&reason.to_string()), reason);
        }
    }

    #[test]
    fn unknown_tokens_collapse_to_internal_error() {
        assert_eq!(
            Reason::from_token("db_server_error: connection reset"),
            Reason::InternalServerError
        );
    }
}
