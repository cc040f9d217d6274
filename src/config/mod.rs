//! Configuration module.
//!
//! One JSON document configures all four binaries: the lobby and storage
//! services plus the game binaries read the same file so the services can
//! find each other without per-process flags.
//!
//! - [`types`]: root [`Config`] struct and per-service sections
//! - [`loader`]: file/env/stdin loading with `ARCADIA__` overrides
//! - [`validation`]: startup sanity checks
//! - [`defaults`]: default value functions
//! - [`logging`]: logging section types

pub mod defaults;
pub mod loader;
pub mod logging;
pub mod types;
pub mod validation;

pub use loader::load;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use types::{Config, GameConfig, LobbyConfig, StorageConfig};

pub use validation::validate;
