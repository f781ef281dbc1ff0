use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_CAPACITY: usize = 5;
pub const DEFAULT_MAX_SLEEP_MS: u64 = 1000;

/// How `shutdown()` frees workers that are blocked on a counting wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Close both counting waits; every waiter returns `Closed`.
    #[default]
    Close,
    /// Release one permit per producer and one per consumer.
    ReleasePermits,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub capacity: usize,
    pub producers: usize,
    pub consumers: usize,
    pub run_duration_ms: u64,
    pub max_sleep_ms: u64,
    pub join_timeout_ms: u64,
    pub strategy: StrategyKind,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            producers: 1,
            consumers: 1,
            run_duration_ms: 5000,
            max_sleep_ms: DEFAULT_MAX_SLEEP_MS,
            join_timeout_ms: 10_000,
            strategy: StrategyKind::Close,
        }
    }
}

impl RunConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses the positional form `<sleepSeconds> <numProducers> <numConsumers>`.
    /// `args` must not include the program name.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self, ConfigError> {
        let [sleep, producers, consumers] = args else {
            return Err(ConfigError::Usage);
        };

        let sleep_secs: u64 = parse_arg("sleepSeconds", sleep.as_ref())?;
        let config = RunConfig {
            run_duration_ms: sleep_secs.saturating_mul(1000),
            producers: parse_arg("numProducers", producers.as_ref())?,
            consumers: parse_arg("numConsumers", consumers.as_ref())?,
            ..RunConfig::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.join_timeout_ms == 0 {
            return Err(ConfigError::ZeroJoinTimeout);
        }
        Ok(())
    }

    pub fn run_duration(&self) -> Duration {
        Duration::from_millis(self.run_duration_ms)
    }

    pub fn max_sleep(&self) -> Duration {
        Duration::from_millis(self.max_sleep_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

fn parse_arg<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid_argument(name, value))
}
