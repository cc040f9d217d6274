use serde::{Deserialize, Serialize};
use std::fmt;

use super::defaults;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

/// Log verbosity, mapped onto an env-filter directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logging configuration shared by all binaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level override; when absent, `RUST_LOG` applies, falling back to `info`.
    #[serde(default)]
    pub level: Option<LogLevel>,
    #[serde(default = "defaults::default_log_format")]
    pub format: LogFormat,
    #[serde(default = "defaults::default_enable_file_logging")]
    pub enable_file_logging: bool,
    #[serde(default = "defaults::default_log_dir")]
    pub dir: String,
    #[serde(default = "defaults::default_log_filename")]
    pub filename: String,
    /// `daily`, `hourly`, or `never`.
    #[serde(default = "defaults::default_rotation")]
    pub rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: defaults::default_log_format(),
            enable_file_logging: defaults::default_enable_file_logging(),
            dir: defaults::default_log_dir(),
            filename: defaults::default_log_filename(),
            rotation: defaults::default_rotation(),
        }
    }
}
