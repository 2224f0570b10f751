//! Logging initialisation.
//!
//! The crate only emits `tracing` events; installing a subscriber is up to
//! the application. [`init_logging`] is a ready-made fmt subscriber that
//! honours the `AUTOCHAIN_LOG` environment variable.

use crate::error::{Error, Result};
use serde::Deserialize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_ENV: &str = "AUTOCHAIN_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for this crate when `AUTOCHAIN_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
    pub timestamps: bool,
    /// Show worker thread names, useful to follow a task across workers.
    pub thread_names: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            timestamps: true,
            thread_names: true,
        }
    }
}

impl LoggingConfig {
    fn env_filter(&self) -> Result<EnvFilter> {
        match std::env::var(LOG_ENV) {
            Ok(directives) => EnvFilter::try_new(&directives)
                .map_err(|e| Error::config(format!("{}: {}", LOG_ENV, e))),
            Err(_) => EnvFilter::try_new(format!("autochain={}", self.level))
                .map_err(|e| Error::config(format!("log level '{}': {}", self.level, e))),
        }
    }
}

/// Installs a global fmt subscriber. Returns `Ok(false)` if another
/// subscriber was already installed, so repeated calls are harmless.
pub fn init_logging(config: &LoggingConfig) -> Result<bool> {
    let filter = config.env_filter()?;

    let layer = fmt::layer()
        .with_target(true)
        .with_thread_names(config.thread_names);
    let layer = match (config.format, config.timestamps) {
        (LogFormat::Pretty, true) => layer.boxed(),
        (LogFormat::Pretty, false) => layer.without_time().boxed(),
        (LogFormat::Compact, true) => layer.compact().boxed(),
        (LogFormat::Compact, false) => layer.compact().without_time().boxed(),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(level = %config.level, format = ?config.format, "logging initialized");
    }
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: LoggingConfig = toml::from_str("level = \"debug\"\nformat = \"compact\"").unwrap();
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Compact);
        assert!(config.timestamps);
    }

    #[test]
    fn test_init_is_repeatable() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            ..Default::default()
        };
        assert!(init_logging(&config).is_ok());
        assert_eq!(init_logging(&config).unwrap(), false);
    }
}
