//! Envelope-level request validation.
//!
//! Checks the shape of `data` before an action handler runs: credential
//! actions need a username and password, game-naming actions need an
//! integer `game_id`, file-bearing actions need `file_data`, and search
//! needs a non-empty `query`. Violations are answered with an error reply;
//! the connection stays open.

use serde_json::Value;

use super::reason::Reason;

/// Fetch the first present string field among `keys`, trimmed.
pub fn str_field<'a>(data: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| data.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Fetch an unsigned integer field.
pub fn int_field(data: &Value, key: &str) -> Option<u64> {
    data.get(key).and_then(Value::as_u64)
}

/// Validate a request envelope against the per-action shape rules.
pub fn validate_request(action: &str, data: &Value) -> Result<(), Reason> {
    match action {
        "register" | "login" => {
            let user = str_field(data, &["user", "username"]);
            let pass = str_field(data, &["pass", "password"]);
            if user.is_none() || pass.is_none() {
                return Err(Reason::MissingFields);
            }
        }
        "join_room" => {
            if data.get("room_id").is_none() {
                return Err(Reason::MissingFields);
            }
            if int_field(data, "room_id").is_none() {
                return Err(Reason::InvalidField("room_id".into()));
            }
        }
        "invite" => {
            if str_field(data, &["target_user"]).is_none() {
                return Err(Reason::MissingFields);
            }
        }
        "upload_game" => {
            // Version is optional; the handler defaults it.
            if str_field(data, &["name"]).is_none() || str_field(data, &["file_data"]).is_none() {
                return Err(Reason::MissingFields);
            }
        }
        "update_game" => {
            require_game_id(data)?;
            if str_field(data, &["version"]).is_none()
                && str_field(data, &["file_data"]).is_none()
            {
                return Err(Reason::MissingFields);
            }
        }
        "remove_game" | "get_game_info" | "download_game" => {
            require_game_id(data)?;
        }
        "search_games" => {
            if str_field(data, &["query"]).is_none() {
                return Err(Reason::MissingFields);
            }
        }
        "game_over" => {
            if int_field(data, "room_id").is_none() {
                return Err(Reason::MissingFields);
            }
        }
        _ => {}
    }
    Ok(())
}

fn require_game_id(data: &Value) -> Result<(), Reason> {
    if data.get("game_id").is_none() {
        return Err(Reason::MissingFields);
    }
    if int_field(data, "game_id").is_none() {
        return Err(Reason::InvalidField("game_id".into()));
    }
    Ok(())
}

/// Version strings become a path segment (`v<version>/`); restrict them to
/// a filesystem-safe alphabet.
pub fn validate_version(version: &str) -> Result<(), Reason> {
    let ok = !version.is_empty()
        && version.len() <= 64
        && version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if ok {
        Ok(())
    } else {
        Err(Reason::InvalidField("version".into()))
    }
}
