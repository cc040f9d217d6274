use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::defaults;
use super::logging::LoggingConfig;

/// Root configuration shared by all four binaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub lobby: LobbyConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Lobby service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyConfig {
    /// Address the lobby binds to and advertises in `GAME_START` pushes.
    #[serde(default = "defaults::default_lobby_host")]
    pub host: String,
    #[serde(default = "defaults::default_lobby_port")]
    pub port: u16,
    #[serde(default = "defaults::default_client_queue_size")]
    pub client_queue_size: usize,
}

impl LobbyConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            host: defaults::default_lobby_host(),
            port: defaults::default_lobby_port(),
            client_queue_size: defaults::default_client_queue_size(),
        }
    }
}

/// Storage service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "defaults::default_storage_host")]
    pub host: String,
    #[serde(default = "defaults::default_storage_port")]
    pub port: u16,
    /// Directory holding the collection files and uploaded game artifacts.
    #[serde(default = "defaults::default_data_dir")]
    pub data_dir: String,
}

impl StorageConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Root of the artifact tree: `<data_dir>/games/<game-id>/v<version>/`.
    pub fn games_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("games")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            host: defaults::default_storage_host(),
            port: defaults::default_storage_port(),
            data_dir: defaults::default_data_dir(),
        }
    }
}

/// Match-service launch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default = "defaults::default_game_start_port")]
    pub start_port: u16,
    /// How long the lobby probes a freshly spawned match service.
    #[serde(default = "defaults::default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
    #[serde(default = "defaults::default_ready_poll_ms")]
    pub ready_poll_ms: u64,
    /// Fallback command when a room has no resolvable artifact. The uniform
    /// `--mode server --port ... --p1 ... --p2 ... --room_id ...` arguments
    /// are appended.
    #[serde(default = "defaults::default_game_command")]
    pub default_command: Vec<String>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            start_port: defaults::default_game_start_port(),
            ready_timeout_secs: defaults::default_ready_timeout_secs(),
            ready_poll_ms: defaults::default_ready_poll_ms(),
            default_command: defaults::default_game_command(),
        }
    }
}
