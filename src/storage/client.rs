//! Typed client for the storage service.
//!
//! Every call opens a fresh connection, sends one request, and reads one
//! reply; the storage service serves one request per connection. Transport
//! failures map into the shared reason taxonomy (`db_server_*`); business
//! errors pass through as their own tokens.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::net::TcpStream;

use super::models::{GameLogEntry, GameLogRecord, GameRecord, GameVersionRecord, UserView};
use crate::protocol::{framing, Reason, Reply, StorageRequest, UserProfile};

#[derive(Debug, Clone)]
pub struct StorageClient {
    addr: String,
}

impl StorageClient {
    pub fn new(addr: String) -> Self {
        Self { addr }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn request(&self, request: &StorageRequest) -> Result<Reply, Reason> {
        let mut stream = TcpStream::connect(&self.addr).await.map_err(|e| {
            tracing::error!(addr = %self.addr, error = %e, "storage connection failed");
            Reason::DbServerConnectionError
        })?;

        framing::send_message(&mut stream, request)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to send storage request");
                Reason::DbServerConnectionError
            })?;

        match framing::recv_message::<_, Reply>(&mut stream).await {
            Ok(Some(reply)) => Ok(reply),
            Ok(None) => {
                tracing::warn!("storage service closed the connection without replying");
                Err(Reason::DbServerNoResponse)
            }
            Err(e) => {
                tracing::error!(error = %e, "undecodable storage reply");
                Err(Reason::DbServerNoResponse)
            }
        }
    }

    /// Issue a request and unwrap an `ok` reply, mapping errors into the
    /// taxonomy.
    async fn expect_ok(&self, request: &StorageRequest) -> Result<Reply, Reason> {
        let reply = self.request(request).await?;
        match reply.reason() {
            None => Ok(reply),
            Some(reason) => Err(reason),
        }
    }

    fn body_field<T: DeserializeOwned>(reply: &Reply, key: &str) -> Result<T, Reason> {
        reply
            .body
            .get(key)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .ok_or(Reason::InternalServerError)
    }

    // === User ===

    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        is_developer: bool,
    ) -> Result<(), Reason> {
        let req = StorageRequest::new(
            "User",
            "create",
            json!({ "username": username, "password": password, "is_developer": is_developer }),
        );
        self.expect_ok(&req).await.map(|_| ())
    }

    /// Validate credentials; returns the hash-free profile on success.
    pub async fn verify_user(&self, username: &str, password: &str) -> Result<UserProfile, Reason> {
        let req = StorageRequest::new(
            "User",
            "query",
            json!({ "username": username, "password": password }),
        );
        let reply = self.expect_ok(&req).await?;
        Self::body_field(&reply, "user")
    }

    pub async fn get_user(&self, username: &str) -> Result<UserView, Reason> {
        let req = StorageRequest::new("User", "get", json!({ "username": username }));
        let reply = self.expect_ok(&req).await?;
        Self::body_field(&reply, "user")
    }

    pub async fn update_user_status(&self, username: &str, status: &str) -> Result<(), Reason> {
        let req = StorageRequest::new(
            "User",
            "update",
            json!({ "username": username, "status": status }),
        );
        self.expect_ok(&req).await.map(|_| ())
    }

    // === Game ===

    pub async fn create_game(
        &self,
        name: &str,
        author: &str,
        description: &str,
        version: &str,
    ) -> Result<u64, Reason> {
        let req = StorageRequest::new(
            "Game",
            "create",
            json!({ "name": name, "author": author, "description": description, "version": version }),
        );
        let reply = self.expect_ok(&req).await?;
        Self::body_field(&reply, "game_id")
    }

    pub async fn query_game(&self, game_id: u64) -> Result<GameRecord, Reason> {
        let req = StorageRequest::new("Game", "query", json!({ "game_id": game_id }));
        let reply = self.expect_ok(&req).await?;
        Self::body_field(&reply, "game")
    }

    pub async fn list_games(&self) -> Result<Vec<GameRecord>, Reason> {
        let req = StorageRequest::new("Game", "list", Value::Null);
        let reply = self.expect_ok(&req).await?;
        Self::body_field(&reply, "games")
    }

    pub async fn list_games_by_author(&self, author: &str) -> Result<Vec<GameRecord>, Reason> {
        let req = StorageRequest::new("Game", "list_by_author", json!({ "author": author }));
        let reply = self.expect_ok(&req).await?;
        Self::body_field(&reply, "games")
    }

    pub async fn search_games(&self, query: &str) -> Result<Vec<GameRecord>, Reason> {
        let req = StorageRequest::new("Game", "search", json!({ "query": query }));
        let reply = self.expect_ok(&req).await?;
        Self::body_field(&reply, "games")
    }

    pub async fn update_game(
        &self,
        game_id: u64,
        name: Option<&str>,
        description: Option<&str>,
        current_version: Option<&str>,
    ) -> Result<(), Reason> {
        let mut data = json!({ "game_id": game_id });
        if let Some(name) = name {
            data["name"] = name.into();
        }
        if let Some(description) = description {
            data["description"] = description.into();
        }
        if let Some(version) = current_version {
            data["current_version"] = version.into();
        }
        let req = StorageRequest::new("Game", "update", data);
        self.expect_ok(&req).await.map(|_| ())
    }

    pub async fn delete_game(&self, game_id: u64) -> Result<(), Reason> {
        let req = StorageRequest::new("Game", "delete", json!({ "game_id": game_id }));
        self.expect_ok(&req).await.map(|_| ())
    }

    // === GameVersion ===

    pub async fn create_version(
        &self,
        game_id: u64,
        version: &str,
        file_path: &str,
        file_hash: &str,
    ) -> Result<u64, Reason> {
        let req = StorageRequest::new(
            "GameVersion",
            "create",
            json!({
                "game_id": game_id,
                "version": version,
                "file_path": file_path,
                "file_hash": file_hash,
            }),
        );
        let reply = self.expect_ok(&req).await?;
        Self::body_field(&reply, "version_id")
    }

    /// Fetch a specific version, or the latest upload when `version` is
    /// `None`.
    pub async fn query_version(
        &self,
        game_id: u64,
        version: Option<&str>,
    ) -> Result<GameVersionRecord, Reason> {
        let data = match version {
            Some(version) => json!({ "game_id": game_id, "version": version }),
            None => json!({ "game_id": game_id }),
        };
        let req = StorageRequest::new("GameVersion", "query", data);
        let reply = self.expect_ok(&req).await?;
        Self::body_field(&reply, "version")
    }

    // === GameLog ===

    pub async fn create_game_log(&self, entry: &GameLogEntry) -> Result<(), Reason> {
        let data = serde_json::to_value(entry).map_err(|_| Reason::InternalServerError)?;
        let req = StorageRequest::new("GameLog", "create", data);
        self.expect_ok(&req).await.map(|_| ())
    }

    pub async fn query_game_logs(&self, user_id: Option<&str>) -> Result<Vec<GameLogRecord>, Reason> {
        let data = match user_id {
            Some(user) => json!({ "userId": user }),
            None => Value::Null,
        };
        let req = StorageRequest::new("GameLog", "query", data);
        let reply = self.expect_ok(&req).await?;
        Self::body_field(&reply, "logs")
    }
}
