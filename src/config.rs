use crate::error::{Error, Result};
use crate::scheduler::Priority;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const MAX_WORKERS: usize = 256;

#[derive(Debug, Clone)]
pub struct Config {
    pub num_workers: Option<usize>,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,

    /// How long a paused worker sleeps before re-checking the pause flag.
    /// Resuming wakes paused workers early.
    pub pause_poll_interval: Duration,
    /// Upper bound a worker blocks on an empty queue before re-checking
    /// the running and paused flags.
    pub pop_timeout: Duration,
    /// Per-worker grace period `stop` waits before abandoning a worker
    /// still busy with a long operation.
    pub stop_grace_period: Duration,
    /// Bound applied when a sequence step produces a task handle.
    pub step_wait_timeout: Duration,

    pub default_priority: Priority,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_workers: None,
            thread_name_prefix: "autochain-worker".to_string(),
            stack_size: Some(2 * 1024 * 1024),
            pause_poll_interval: Duration::from_millis(500),
            pop_timeout: Duration::from_secs(1),
            stop_grace_period: Duration::from_secs(2),
            step_wait_timeout: Duration::from_secs(10),
            default_priority: Priority::NORMAL,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_workers {
            if n == 0 {
                return Err(Error::config("num_workers must be > 0"));
            }
            if n > MAX_WORKERS {
                return Err(Error::config(format!(
                    "num_workers too large (max {})",
                    MAX_WORKERS
                )));
            }
        }

        if self.thread_name_prefix.is_empty() {
            return Err(Error::config("thread_name_prefix must not be empty"));
        }

        for (name, value) in [
            ("pause_poll_interval", self.pause_poll_interval),
            ("pop_timeout", self.pop_timeout),
            ("stop_grace_period", self.stop_grace_period),
            ("step_wait_timeout", self.step_wait_timeout),
        ] {
            if value.is_zero() {
                return Err(Error::config(format!("{} must be > 0", name)));
            }
        }

        Ok(())
    }

    pub fn worker_threads(&self) -> usize {
        self.num_workers.unwrap_or_else(num_cpus::get)
    }

    /// Parses a TOML document. Durations are given in milliseconds; missing
    /// keys keep their defaults.
    ///
    /// ```toml
    /// num_workers = 3
    /// pause_poll_interval_ms = 250
    /// default_priority = 4
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(source)?;
        let config = file.into_config();
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}

/// On-disk shape of [`Config`].
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    num_workers: Option<usize>,
    thread_name_prefix: String,
    stack_size: Option<usize>,
    pause_poll_interval_ms: u64,
    pop_timeout_ms: u64,
    stop_grace_period_ms: u64,
    step_wait_timeout_ms: u64,
    default_priority: Priority,
}

impl Default for ConfigFile {
    fn default() -> Self {
        let defaults = Config::default();
        Self {
            num_workers: defaults.num_workers,
            thread_name_prefix: defaults.thread_name_prefix,
            stack_size: defaults.stack_size,
            pause_poll_interval_ms: defaults.pause_poll_interval.as_millis() as u64,
            pop_timeout_ms: defaults.pop_timeout.as_millis() as u64,
            stop_grace_period_ms: defaults.stop_grace_period.as_millis() as u64,
            step_wait_timeout_ms: defaults.step_wait_timeout.as_millis() as u64,
            default_priority: defaults.default_priority,
        }
    }
}

impl ConfigFile {
    fn into_config(self) -> Config {
        Config {
            num_workers: self.num_workers,
            thread_name_prefix: self.thread_name_prefix,
            stack_size: self.stack_size,
            pause_poll_interval: Duration::from_millis(self.pause_poll_interval_ms),
            pop_timeout: Duration::from_millis(self.pop_timeout_ms),
            stop_grace_period: Duration::from_millis(self.stop_grace_period_ms),
            step_wait_timeout: Duration::from_millis(self.step_wait_timeout_ms),
            default_priority: self.default_priority,
        }
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn num_workers(mut self, n: usize) -> Self {
        self.config.num_workers = Some(n);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn pause_poll_interval(mut self, interval: Duration) -> Self {
        self.config.pause_poll_interval = interval;
        self
    }

    pub fn pop_timeout(mut self, timeout: Duration) -> Self {
        self.config.pop_timeout = timeout;
        self
    }

    pub fn stop_grace_period(mut self, grace: Duration) -> Self {
        self.config.stop_grace_period = grace;
        self
    }

    pub fn step_wait_timeout(mut self, timeout: Duration) -> Self {
        self.config.step_wait_timeout = timeout;
        self
    }

    pub fn default_priority(mut self, priority: Priority) -> Self {
        self.config.default_priority = priority;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.worker_threads() >= 1);
        assert_eq!(config.pause_poll_interval, Duration::from_millis(500));
        assert_eq!(config.default_priority.get(), 5);
    }

    #[test]
    fn test_builder_rejects_bad_values() {
        assert!(Config::builder().num_workers(0).build().is_err());
        assert!(Config::builder().num_workers(MAX_WORKERS + 1).build().is_err());
        assert!(Config::builder().pop_timeout(Duration::ZERO).build().is_err());
        assert!(Config::builder().thread_name_prefix("").build().is_err());

        let config = Config::builder()
            .num_workers(3)
            .thread_name_prefix("bot")
            .build()
            .unwrap();
        assert_eq!(config.worker_threads(), 3);
        assert_eq!(config.thread_name_prefix, "bot");
    }

    #[test]
    fn test_from_toml() {
        let config = Config::from_toml_str(
            r#"
            num_workers = 2
            pause_poll_interval_ms = 100
            default_priority = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.num_workers, Some(2));
        assert_eq!(config.pause_poll_interval, Duration::from_millis(100));
        assert_eq!(config.default_priority.get(), 3);
        assert_eq!(config.pop_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_from_toml_rejects_invalid() {
        assert!(matches!(
            Config::from_toml_str("default_priority = 11"),
            Err(Error::Toml(_))
        ));
        assert!(matches!(
            Config::from_toml_str("num_workers = 0"),
            Err(Error::Config(_))
        ));
        assert!(Config::from_toml_str("unknown_key = true").is_err());
    }
}
