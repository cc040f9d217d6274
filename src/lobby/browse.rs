//! Game browsing and download, available to every authenticated user.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};

use super::{ClientConn, LobbyServer};
use crate::artifacts;
use crate::protocol::validation::{int_field, str_field};
use crate::protocol::{Reason, Reply};

impl LobbyServer {
    /// `list_games`: every non-deleted game in the catalog.
    pub(crate) async fn handle_list_games(&self, conn: &ClientConn) {
        match self.storage.list_games().await {
            Ok(games) => {
                conn.send(&Reply::ok().with_field("games", super::to_json(&games)))
                    .await;
            }
            Err(reason) => conn.send(&Reply::error(reason)).await,
        }
    }

    /// `search_games{query}`: case-insensitive substring over name, author,
    /// and description.
    pub(crate) async fn handle_search_games(&self, conn: &ClientConn, data: &Value) {
        let Some(query) = str_field(data, &["query"]) else {
            conn.send(&Reply::error(Reason::MissingFields)).await;
            return;
        };
        match self.storage.search_games(query).await {
            Ok(games) => {
                conn.send(&Reply::ok().with_field("games", super::to_json(&games)))
                    .await;
            }
            Err(reason) => conn.send(&Reply::error(reason)).await,
        }
    }

    /// `get_game_info{game_id}`: works for soft-deleted games too.
    pub(crate) async fn handle_get_game_info(&self, conn: &ClientConn, data: &Value) {
        let Some(game_id) = int_field(data, "game_id") else {
            conn.send(&Reply::error(Reason::MissingFields)).await;
            return;
        };
        match self.storage.query_game(game_id).await {
            Ok(game) => {
                conn.send(&Reply::ok().with_field("game", super::to_json(&game)))
                    .await;
            }
            Err(reason) => conn.send(&Reply::error(reason)).await,
        }
    }

    /// `download_game{game_id, version?}`: resolve game, version (defaults
    /// to the current one), and stored file, and return the bytes base64
    /// encoded together with the recorded content hash.
    pub(crate) async fn handle_download_game(&self, conn: &ClientConn, data: &Value) {
        let Some(game_id) = int_field(data, "game_id") else {
            conn.send(&Reply::error(Reason::MissingFields)).await;
            return;
        };

        let game = match self.storage.query_game(game_id).await {
            Ok(game) => game,
            Err(reason) => {
                conn.send(&Reply::error(reason)).await;
                return;
            }
        };

        let requested = str_field(data, &["version"])
            .map(str::to_string)
            .or_else(|| game.current_version.clone());

        let version = match self
            .storage
            .query_version(game_id, requested.as_deref())
            .await
        {
            Ok(version) => version,
            Err(reason) => {
                conn.send(&Reply::error(reason)).await;
                return;
            }
        };

        let bytes = match artifacts::read_artifact(std::path::Path::new(&version.file_path)).await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(game_id, path = %version.file_path, error = %e, "stored artifact missing");
                conn.send(&Reply::error(Reason::FileNotFound)).await;
                return;
            }
        };

        tracing::info!(game_id, version = %version.version, size = bytes.len(), "serving download");
        conn.send(
            &Reply::ok()
                .with_field("action", json!("download_game"))
                .with_field("game_id", json!(game_id))
                .with_field("game_name", json!(game.name))
                .with_field("version", json!(version.version))
                .with_field("file_data", json!(BASE64.encode(&bytes)))
                .with_field("file_hash", json!(version.file_hash)),
        )
        .await;
    }
}
