//! Developer actions: upload, update, remove, and list owned games.
//!
//! Every action re-checks the caller's developer flag with a fresh
//! `User.get` query so a revoked flag takes effect immediately, not at the
//! next login.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};

use super::{ClientConn, LobbyServer};
use crate::artifacts;
use crate::protocol::validation::{int_field, str_field, validate_version};
use crate::protocol::{Push, Reason, Reply};

const DEFAULT_VERSION: &str = "1.0.0";

impl LobbyServer {
    async fn ensure_developer(&self, username: &str) -> Result<(), Reason> {
        match self.storage.get_user(username).await {
            Ok(user) if user.is_developer => Ok(()),
            Ok(_) => Err(Reason::NotDeveloper),
            Err(Reason::UserNotFound) => Err(Reason::NotDeveloper),
            Err(reason) => Err(reason),
        }
    }

    /// `upload_game{name, description?, version?, file_data}`.
    pub(crate) async fn handle_upload_game(&self, conn: &ClientConn, username: &str, data: &Value) {
        if let Err(reason) = self.ensure_developer(username).await {
            conn.send(&Reply::error(reason)).await;
            return;
        }

        let Some(name) = str_field(data, &["name"]).map(str::to_string) else {
            conn.send(&Reply::error(Reason::MissingFields)).await;
            return;
        };
        let description = str_field(data, &["description"]).unwrap_or("").to_string();
        let version = str_field(data, &["version"])
            .unwrap_or(DEFAULT_VERSION)
            .to_string();
        if let Err(reason) = validate_version(&version) {
            conn.send(&Reply::error(reason)).await;
            return;
        }

        let bytes = match decode_file_data(data) {
            Ok(bytes) => bytes,
            Err(reason) => {
                conn.send(&Reply::error(reason)).await;
                return;
            }
        };
        let file_hash = artifacts::content_hash(&bytes);

        let game_id = match self
            .storage
            .create_game(&name, username, &description, &version)
            .await
        {
            Ok(id) => id,
            Err(reason) => {
                conn.send(&Reply::error(reason)).await;
                return;
            }
        };

        // Partial failures past this point leave orphan rows; log and
        // carry on rather than attempting a rollback.
        let games_root = self.config.storage.games_dir();
        let file_path = match artifacts::save_artifact(&games_root, game_id, &version, &bytes).await
        {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(game_id, error = %e, "failed to store artifact");
                conn.send(&Reply::error(Reason::InternalServerError)).await;
                return;
            }
        };

        if let Err(reason) = self
            .storage
            .create_version(game_id, &version, &file_path.to_string_lossy(), &file_hash)
            .await
        {
            tracing::warn!(game_id, %version, %reason, "game created but version row failed");
        }

        tracing::info!(user = username, game_id, %name, %version, "uploaded game");
        conn.send(
            &Reply::ok()
                .with_reason("game_uploaded")
                .with_field("game_id", json!(game_id))
                .with_field("version", json!(version)),
        )
        .await;
    }

    /// `update_game{game_id, name?, version, description?, file_data?}`:
    /// metadata-only without `file_data`, otherwise a new stored version.
    pub(crate) async fn handle_update_game(&self, conn: &ClientConn, username: &str, data: &Value) {
        if let Err(reason) = self.ensure_developer(username).await {
            conn.send(&Reply::error(reason)).await;
            return;
        }

        let Some(game_id) = int_field(data, "game_id") else {
            conn.send(&Reply::error(Reason::MissingFields)).await;
            return;
        };
        let Some(version) = str_field(data, &["version"]).map(str::to_string) else {
            conn.send(&Reply::error(Reason::MissingFields)).await;
            return;
        };
        if let Err(reason) = validate_version(&version) {
            conn.send(&Reply::error(reason)).await;
            return;
        }
        let name = str_field(data, &["name"]).map(str::to_string);
        let description = data
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        // Ownership check for both the metadata-only and the file path.
        match self.storage.query_game(game_id).await {
            Ok(game) if game.author == username => {}
            Ok(_) => {
                conn.send(&Reply::error(Reason::NotGameOwner)).await;
                return;
            }
            Err(reason) => {
                conn.send(&Reply::error(reason)).await;
                return;
            }
        }

        if data.get("file_data").and_then(Value::as_str).is_none() {
            // Metadata-only: the named version must already exist, so
            // current_version always points at a real GameVersion row.
            if let Err(reason) = self.storage.query_version(game_id, Some(version.as_str())).await {
                conn.send(&Reply::error(reason)).await;
                return;
            }
        } else {
            let bytes = match decode_file_data(data) {
                Ok(bytes) => bytes,
                Err(reason) => {
                    conn.send(&Reply::error(reason)).await;
                    return;
                }
            };
            let file_hash = artifacts::content_hash(&bytes);
            let games_root = self.config.storage.games_dir();
            let file_path =
                match artifacts::save_artifact(&games_root, game_id, &version, &bytes).await {
                    Ok(path) => path,
                    Err(e) => {
                        tracing::error!(game_id, error = %e, "failed to store artifact");
                        conn.send(&Reply::error(Reason::InternalServerError)).await;
                        return;
                    }
                };
            if let Err(reason) = self
                .storage
                .create_version(game_id, &version, &file_path.to_string_lossy(), &file_hash)
                .await
            {
                conn.send(&Reply::error(reason)).await;
                return;
            }
        }

        if let Err(reason) = self
            .storage
            .update_game(
                game_id,
                name.as_deref(),
                Some(description.as_str()),
                Some(version.as_str()),
            )
            .await
        {
            conn.send(&Reply::error(reason)).await;
            return;
        }

        tracing::info!(user = username, game_id, %version, "updated game");
        conn.send(
            &Reply::ok()
                .with_reason("game_updated")
                .with_field("game_id", json!(game_id))
                .with_field("version", json!(version)),
        )
        .await;
    }

    /// `remove_game{game_id}`: soft delete; files and version rows remain.
    pub(crate) async fn handle_remove_game(&self, conn: &ClientConn, username: &str, data: &Value) {
        if let Err(reason) = self.ensure_developer(username).await {
            conn.send(&Reply::error(reason)).await;
            return;
        }
        let Some(game_id) = int_field(data, "game_id") else {
            conn.send(&Reply::error(Reason::MissingFields)).await;
            return;
        };

        match self.storage.query_game(game_id).await {
            Ok(game) if game.author == username => {}
            Ok(_) => {
                conn.send(&Reply::error(Reason::NotGameOwner)).await;
                return;
            }
            Err(reason) => {
                conn.send(&Reply::error(reason)).await;
                return;
            }
        }

        if let Err(reason) = self.storage.delete_game(game_id).await {
            conn.send(&Reply::error(reason)).await;
            return;
        }

        tracing::info!(user = username, game_id, "removed game");
        conn.send(&Reply::ok().with_reason("game_removed")).await;

        // Let every connected client purge its local copy.
        self.broadcast_all(&Push::GameDeleted { game_id }).await;
    }

    /// `list_my_games`: the caller's non-deleted games.
    pub(crate) async fn handle_list_my_games(&self, conn: &ClientConn, username: &str) {
        if let Err(reason) = self.ensure_developer(username).await {
            conn.send(&Reply::error(reason)).await;
            return;
        }
        match self.storage.list_games_by_author(username).await {
            Ok(games) => {
                conn.send(&Reply::ok().with_field("games", super::to_json(&games)))
                    .await;
            }
            Err(reason) => conn.send(&Reply::error(reason)).await,
        }
    }
}

fn decode_file_data(data: &Value) -> Result<Vec<u8>, Reason> {
    let encoded = data
        .get("file_data")
        .and_then(Value::as_str)
        .ok_or(Reason::MissingFields)?;
    BASE64
        .decode(encoded)
        .map_err(|_| Reason::InvalidField("file_data".into()))
}
