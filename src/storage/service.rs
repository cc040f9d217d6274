//! Request dispatch for the storage service.
//!
//! Requests are `{collection, action, data}`; each `(collection, action)`
//! pair maps to one handler over the owning collection. No handler touches
//! more than one collection lock.

use chrono::Utc;
use serde_json::Value;
use std::path::Path;

use super::models::{GameLogEntry, GameLogRecord, GameRecord, GameVersionRecord, UserRecord, UserView};
use super::password::{hash_password, verify_password};
use super::store::JsonStore;
use crate::protocol::validation::{int_field, str_field};
use crate::protocol::{Reason, Reply, UserProfile};

/// The authoritative catalog: users, games, game versions, and match logs,
/// each behind its own collection lock.
pub struct StorageService {
    users: JsonStore<UserRecord>,
    games: JsonStore<GameRecord>,
    versions: JsonStore<GameVersionRecord>,
    logs: JsonStore<GameLogRecord>,
}

impl StorageService {
    /// Open (or create) the collection files under `data_dir`.
    pub async fn open(data_dir: &Path) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        Ok(Self {
            users: JsonStore::open(data_dir.join("users.json")).await?,
            games: JsonStore::open(data_dir.join("games.json")).await?,
            versions: JsonStore::open(data_dir.join("game_versions.json")).await?,
            logs: JsonStore::open(data_dir.join("game_logs.json")).await?,
        })
    }

    /// Dispatch a decoded request body.
    pub async fn dispatch_value(&self, request: &Value) -> Reply {
        let Some(collection) = request.get("collection").and_then(Value::as_str) else {
            return Reply::error(Reason::MissingKey("collection".into()));
        };
        let Some(action) = request.get("action").and_then(Value::as_str) else {
            return Reply::error(Reason::MissingKey("action".into()));
        };
        let data = request.get("data").cloned().unwrap_or(Value::Null);
        self.dispatch(collection, action, &data).await
    }

    pub async fn dispatch(&self, collection: &str, action: &str, data: &Value) -> Reply {
        match (collection, action) {
            ("User", "create") => self.user_create(data).await,
            ("User", "query") => self.user_query(data).await,
            ("User", "get") => self.user_get(data).await,
            ("User", "update") => self.user_update(data).await,
            ("Game", "create") => self.game_create(data).await,
            ("Game", "query") => self.game_query(data).await,
            ("Game", "list") => self.game_list().await,
            ("Game", "list_by_author") => self.game_list_by_author(data).await,
            ("Game", "search") => self.game_search(data).await,
            ("Game", "update") => self.game_update(data).await,
            ("Game", "delete") => self.game_delete(data).await,
            ("GameVersion", "create") => self.version_create(data).await,
            ("GameVersion", "query") => self.version_query(data).await,
            ("GameLog", "create") => self.log_create(data).await,
            ("GameLog", "query") => self.log_query(data).await,
            ("User" | "Game" | "GameVersion" | "GameLog", other) => {
                tracing::warn!(collection, action = other, "unknown storage action");
                Reply::error(Reason::UnknownAction)
            }
            (other, _) => {
                tracing::warn!(collection = other, "unknown storage collection");
                Reply::error(Reason::UnknownCollection)
            }
        }
    }

    // === User ===

    async fn user_create(&self, data: &Value) -> Reply {
        let Some(username) = str_field(data, &["username"]).map(str::to_string) else {
            return Reply::error(Reason::MissingFields);
        };
        let Some(password) = str_field(data, &["password"]).map(str::to_string) else {
            return Reply::error(Reason::MissingFields);
        };
        let is_developer = data
            .get("is_developer")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let exists = self
            .users
            .read(|t| t.items.iter().any(|u| u.username == username))
            .await;
        if exists {
            return Reply::error(Reason::UserExists);
        }

        // The hash is expensive by design; keep it off the async workers.
        let hashed = tokio::task::spawn_blocking(move || hash_password(&password)).await;
        let password_hash = match hashed {
            Ok(Some(hash)) => hash,
            Ok(None) => return Reply::error(Reason::MissingFields),
            Err(e) => {
                tracing::error!(error = %e, "password hashing task failed");
                return Reply::error(Reason::InternalServerError);
            }
        };

        let record = UserRecord {
            username: username.clone(),
            password_hash,
            is_developer,
            status: "offline".to_string(),
            created_at: Utc::now(),
        };

        let outcome = self
            .users
            .write(|t| {
                if t.items.iter().any(|u| u.username == record.username) {
                    (false, Err(Reason::UserExists))
                } else {
                    t.items.push(record.clone());
                    (true, Ok(()))
                }
            })
            .await;

        match outcome {
            Ok(Ok(())) => {
                tracing::info!(%username, "registered new user");
                Reply::ok()
            }
            Ok(Err(reason)) => Reply::error(reason),
            Err(e) => {
                tracing::error!(error = %e, "failed to persist users");
                Reply::error(Reason::InternalServerError)
            }
        }
    }

    async fn user_query(&self, data: &Value) -> Reply {
        let Some(username) = str_field(data, &["username"]).map(str::to_string) else {
            return Reply::error(Reason::MissingFields);
        };
        let Some(password) = str_field(data, &["password"]).map(str::to_string) else {
            return Reply::error(Reason::MissingFields);
        };

        let user = self
            .users
            .read(|t| t.items.iter().find(|u| u.username == username).cloned())
            .await;

        let Some(user) = user else {
            tracing::warn!(%username, "login query for unknown user");
            return Reply::error(Reason::InvalidCredentials);
        };

        let hash = user.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .unwrap_or(false);

        if verified {
            tracing::info!(%username, "credentials verified");
            Reply::ok().with_field(
                "user",
                to_json(&UserProfile {
                    username: user.username,
                    is_developer: user.is_developer,
                }),
            )
        } else {
            tracing::warn!(%username, "credential verification failed");
            Reply::error(Reason::InvalidCredentials)
        }
    }

    async fn user_get(&self, data: &Value) -> Reply {
        let Some(username) = str_field(data, &["username"]) else {
            return Reply::error(Reason::MissingFields);
        };
        let view = self
            .users
            .read(|t| {
                t.items
                    .iter()
                    .find(|u| u.username == username)
                    .map(UserView::from)
            })
            .await;
        match view {
            Some(view) => Reply::ok().with_field("user", to_json(&view)),
            None => Reply::error(Reason::UserNotFound),
        }
    }

    async fn user_update(&self, data: &Value) -> Reply {
        let Some(username) = str_field(data, &["username"]).map(str::to_string) else {
            return Reply::error(Reason::MissingFields);
        };
        let status = str_field(data, &["status"]).map(str::to_string);
        let is_developer = data.get("is_developer").and_then(Value::as_bool);
        if status.is_none() && is_developer.is_none() {
            return Reply::error(Reason::MissingFields);
        }

        let outcome = self
            .users
            .write(|t| match t.items.iter_mut().find(|u| u.username == username) {
                Some(user) => {
                    if let Some(status) = &status {
                        user.status = status.clone();
                    }
                    if let Some(flag) = is_developer {
                        user.is_developer = flag;
                    }
                    (true, Ok(()))
                }
                None => (false, Err(Reason::UserNotFound)),
            })
            .await;

        match outcome {
            Ok(Ok(())) => Reply::ok(),
            Ok(Err(reason)) => Reply::error(reason),
            Err(e) => {
                tracing::error!(error = %e, "failed to persist users");
                Reply::error(Reason::InternalServerError)
            }
        }
    }

    // === Game ===

    async fn game_create(&self, data: &Value) -> Reply {
        let Some(name) = str_field(data, &["name"]).map(str::to_string) else {
            return Reply::error(Reason::MissingFields);
        };
        let Some(author) = str_field(data, &["author"]).map(str::to_string) else {
            return Reply::error(Reason::MissingFields);
        };
        let description = str_field(data, &["description"]).unwrap_or("").to_string();
        let version = str_field(data, &["version"]).map(str::to_string);

        let now = Utc::now();
        let outcome = self
            .games
            .write(|t| {
                let id = t.allocate_id();
                t.items.push(GameRecord {
                    id,
                    name: name.clone(),
                    author: author.clone(),
                    description: description.clone(),
                    current_version: version.clone(),
                    deleted: false,
                    created_at: now,
                    updated_at: now,
                });
                (true, id)
            })
            .await;

        match outcome {
            Ok(id) => {
                tracing::info!(game_id = id, %name, %author, "created game");
                Reply::ok().with_field("game_id", id.into())
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to persist games");
                Reply::error(Reason::InternalServerError)
            }
        }
    }

    async fn game_query(&self, data: &Value) -> Reply {
        let Some(game_id) = int_field(data, "game_id") else {
            return Reply::error(Reason::MissingFields);
        };
        // Soft-deleted games stay addressable by id.
        let game = self
            .games
            .read(|t| t.items.iter().find(|g| g.id == game_id).cloned())
            .await;
        match game {
            Some(game) => Reply::ok().with_field("game", to_json(&game)),
            None => Reply::error(Reason::GameNotFound),
        }
    }

    async fn game_list(&self) -> Reply {
        let games = self
            .games
            .read(|t| {
                t.items
                    .iter()
                    .filter(|g| !g.deleted)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .await;
        Reply::ok().with_field("games", to_json(&games))
    }

    async fn game_list_by_author(&self, data: &Value) -> Reply {
        let Some(author) = str_field(data, &["author"]) else {
            return Reply::error(Reason::MissingFields);
        };
        let games = self
            .games
            .read(|t| {
                t.items
                    .iter()
                    .filter(|g| !g.deleted && g.author == author)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .await;
        Reply::ok().with_field("games", to_json(&games))
    }

    async fn game_search(&self, data: &Value) -> Reply {
        let Some(query) = str_field(data, &["query"]) else {
            return Reply::error(Reason::MissingFields);
        };
        let needle = query.to_lowercase();
        let games = self
            .games
            .read(|t| {
                t.items
                    .iter()
                    .filter(|g| {
                        !g.deleted
                            && (g.name.to_lowercase().contains(&needle)
                                || g.author.to_lowercase().contains(&needle)
                                || g.description.to_lowercase().contains(&needle))
                    })
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .await;
        Reply::ok().with_field("games", to_json(&games))
    }

    async fn game_update(&self, data: &Value) -> Reply {
        let Some(game_id) = int_field(data, "game_id") else {
            return Reply::error(Reason::MissingFields);
        };
        let name = str_field(data, &["name"]).map(str::to_string);
        let description = data
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        let current_version = str_field(data, &["current_version"]).map(str::to_string);

        let outcome = self
            .games
            .write(|t| match t.items.iter_mut().find(|g| g.id == game_id) {
                Some(game) => {
                    if let Some(name) = &name {
                        game.name = name.clone();
                    }
                    if let Some(description) = &description {
                        game.description = description.clone();
                    }
                    if let Some(version) = &current_version {
                        game.current_version = Some(version.clone());
                    }
                    game.updated_at = Utc::now();
                    (true, Ok(()))
                }
                None => (false, Err(Reason::GameNotFound)),
            })
            .await;

        match outcome {
            Ok(Ok(())) => Reply::ok(),
            Ok(Err(reason)) => Reply::error(reason),
            Err(e) => {
                tracing::error!(error = %e, "failed to persist games");
                Reply::error(Reason::InternalServerError)
            }
        }
    }

    async fn game_delete(&self, data: &Value) -> Reply {
        let Some(game_id) = int_field(data, "game_id") else {
            return Reply::error(Reason::MissingFields);
        };
        let outcome = self
            .games
            .write(|t| match t.items.iter_mut().find(|g| g.id == game_id) {
                Some(game) => {
                    game.deleted = true;
                    game.updated_at = Utc::now();
                    (true, Ok(()))
                }
                None => (false, Err(Reason::GameNotFound)),
            })
            .await;

        match outcome {
            Ok(Ok(())) => {
                tracing::info!(game_id, "soft-deleted game");
                Reply::ok()
            }
            Ok(Err(reason)) => Reply::error(reason),
            Err(e) => {
                tracing::error!(error = %e, "failed to persist games");
                Reply::error(Reason::InternalServerError)
            }
        }
    }

    // === GameVersion ===

    async fn version_create(&self, data: &Value) -> Reply {
        let Some(game_id) = int_field(data, "game_id") else {
            return Reply::error(Reason::MissingFields);
        };
        let Some(version) = str_field(data, &["version"]).map(str::to_string) else {
            return Reply::error(Reason::MissingFields);
        };
        let Some(file_path) = str_field(data, &["file_path"]).map(str::to_string) else {
            return Reply::error(Reason::MissingFields);
        };
        let file_hash = str_field(data, &["file_hash"]).unwrap_or("").to_string();

        let outcome = self
            .versions
            .write(|t| {
                if t.items
                    .iter()
                    .any(|v| v.game_id == game_id && v.version == version)
                {
                    return (false, Err(Reason::VersionExists));
                }
                let id = t.allocate_id();
                t.items.push(GameVersionRecord {
                    id,
                    game_id,
                    version: version.clone(),
                    file_path: file_path.clone(),
                    file_hash: file_hash.clone(),
                    uploaded_at: Utc::now(),
                });
                (true, Ok(id))
            })
            .await;

        match outcome {
            Ok(Ok(id)) => {
                tracing::info!(game_id, %version, version_id = id, "recorded game version");
                Reply::ok().with_field("version_id", id.into())
            }
            Ok(Err(reason)) => Reply::error(reason),
            Err(e) => {
                tracing::error!(error = %e, "failed to persist game versions");
                Reply::error(Reason::InternalServerError)
            }
        }
    }

    async fn version_query(&self, data: &Value) -> Reply {
        let Some(game_id) = int_field(data, "game_id") else {
            return Reply::error(Reason::MissingFields);
        };
        let version = str_field(data, &["version"]).map(str::to_string);

        let found = self
            .versions
            .read(|t| match &version {
                Some(version) => t
                    .items
                    .iter()
                    .find(|v| v.game_id == game_id && &v.version == version)
                    .cloned(),
                // Latest upload for the game.
                None => t
                    .items
                    .iter()
                    .filter(|v| v.game_id == game_id)
                    .max_by_key(|v| v.id)
                    .cloned(),
            })
            .await;

        match found {
            Some(record) => Reply::ok().with_field("version", to_json(&record)),
            None => Reply::error(Reason::VersionNotFound),
        }
    }

    // === GameLog ===

    async fn log_create(&self, data: &Value) -> Reply {
        let input: GameLogEntry = match serde_json::from_value(data.clone()) {
            Ok(input) => input,
            Err(e) => {
                tracing::warn!(error = %e, "malformed game log payload");
                return Reply::error(Reason::MissingFields);
            }
        };

        let outcome = self
            .logs
            .write(|t| {
                if t.items.iter().any(|l| l.matchid == input.matchid) {
                    return (false, Err(Reason::GameLogAlreadyExists));
                }
                let id = t.allocate_id();
                t.items.push(GameLogRecord {
                    id,
                    matchid: input.matchid.clone(),
                    game_id: input.game_id,
                    users: input.users.clone(),
                    results: input.results.clone(),
                    winner: input.winner,
                    reason: input.reason,
                    start_time: input.start_time,
                    end_time: input.end_time,
                });
                (true, Ok(()))
            })
            .await;

        match outcome {
            Ok(Ok(())) => {
                tracing::info!(matchid = %input.matchid, "saved game log");
                Reply::ok()
            }
            Ok(Err(reason)) => Reply::error(reason),
            Err(e) => {
                tracing::error!(error = %e, "failed to persist game logs");
                Reply::error(Reason::InternalServerError)
            }
        }
    }

    async fn log_query(&self, data: &Value) -> Reply {
        let user_id = str_field(data, &["userId"]).map(str::to_string);
        let logs = self
            .logs
            .read(|t| {
                t.items
                    .iter()
                    .filter(|l| {
                        user_id
                            .as_ref()
                            .is_none_or(|u| l.users.iter().any(|p| p == u))
                    })
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .await;
        Reply::ok().with_field("logs", to_json(&logs))
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
