//! Default value functions for configuration fields, used by serde's
//! `#[serde(default = ...)]` attributes.

use super::logging::LogFormat;

// =============================================================================
// Lobby
// =============================================================================

pub fn default_lobby_host() -> String {
    "127.0.0.1".to_string()
}

pub const fn default_lobby_port() -> u16 {
    7777
}

/// Outbound frames queued per client before slow consumers start dropping.
pub const fn default_client_queue_size() -> usize {
    256
}

// =============================================================================
// Storage
// =============================================================================

pub fn default_storage_host() -> String {
    "127.0.0.1".to_string()
}

pub const fn default_storage_port() -> u16 {
    7778
}

pub fn default_data_dir() -> String {
    "storage".to_string()
}

// =============================================================================
// Match services
// =============================================================================

/// First port tried when picking a listen port for a spawned match service.
pub const fn default_game_start_port() -> u16 {
    7800
}

pub const fn default_ready_timeout_secs() -> u64 {
    5
}

pub const fn default_ready_poll_ms() -> u64 {
    200
}

/// Command used when a room has no resolvable game artifact.
pub fn default_game_command() -> Vec<String> {
    vec!["tetris".to_string()]
}

// =============================================================================
// Logging
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    true
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
