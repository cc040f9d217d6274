//! Logging initialization shared by all four binaries.
//!
//! Output goes to the console and, when enabled, to a rolling log file.
//! Everything is assembled as boxed layers so the format/file combinations
//! stay in one code path.

use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::Layered;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LoggingConfig};

type FilteredRegistry = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

/// Install the global subscriber. Calling it again (tests, client mode
/// re-entry) is a no-op.
pub fn init_with_config(cfg: &LoggingConfig) {
    let mut layers: Vec<BoxedLayer> = vec![console_layer(cfg.format)];
    if cfg.enable_file_logging {
        match file_writer(cfg) {
            Some(writer) => layers.push(file_layer(cfg.format, writer)),
            None => eprintln!("file logging unavailable, continuing with console output only"),
        }
    }

    let _ = tracing_subscriber::registry()
        .with(level_filter(cfg))
        .with(layers)
        .try_init();
}

/// The configured level wins; otherwise `RUST_LOG`; otherwise `info`.
fn level_filter(cfg: &LoggingConfig) -> EnvFilter {
    match cfg.level {
        Some(level) => EnvFilter::new(level.as_str()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

fn console_layer(format: LogFormat) -> BoxedLayer {
    let base = tracing_subscriber::fmt::layer().with_timer(UtcTime::rfc_3339());
    match format {
        LogFormat::Json => base.json().with_ansi(false).boxed(),
        LogFormat::Text => base.boxed(),
    }
}

fn file_layer(format: LogFormat, writer: NonBlocking) -> BoxedLayer {
    let base = tracing_subscriber::fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_ansi(false)
        .with_writer(writer);
    match format {
        LogFormat::Json => base.json().boxed(),
        LogFormat::Text => base.boxed(),
    }
}

/// Open the rolling appender named by the config. `None` means the log
/// directory could not be created; the caller falls back to console-only.
fn file_writer(cfg: &LoggingConfig) -> Option<NonBlocking> {
    if let Err(e) = std::fs::create_dir_all(&cfg.dir) {
        eprintln!("failed to create log directory '{}': {e}", cfg.dir);
        return None;
    }

    let rotation = match cfg.rotation.to_ascii_lowercase().as_str() {
        "hourly" => Rotation::HOURLY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    };

    let appender = RollingFileAppender::new(rotation, &cfg.dir, &cfg.filename);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    // The flush guard must live as long as the process.
    std::mem::forget(guard);
    Some(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn config_level_takes_priority() {
        let cfg = LoggingConfig {
            level: Some(LogLevel::Debug),
            ..LoggingConfig::default()
        };
        assert_eq!(level_filter(&cfg).to_string(), "debug");
    }

    #[test]
    fn double_init_is_harmless() {
        let cfg = LoggingConfig {
            enable_file_logging: false,
            ..LoggingConfig::default()
        };
        init_with_config(&cfg);
        init_with_config(&cfg);
    }
}
