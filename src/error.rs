use std::path::PathBuf;
use thiserror::Error;

use crate::worker::WorkerId;

// =============================================================================
// Configuration errors: rejected at construction time, never clamped
// =============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("buffer capacity must be at least 1")]
    ZeroCapacity,

    #[error("join timeout must be at least 1 ms")]
    ZeroJoinTimeout,

    #[error("invalid value '{value}' for {name}: expected a non-negative integer")]
    InvalidArgument { name: &'static str, value: String },

    #[error("failed to parse configuration: {message}")]
    Parse { message: String },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Usage: prodcons <sleepSeconds> <numProducers> <numConsumers> | --config <file.toml>")]
    Usage,
}

impl ConfigError {
    pub fn invalid_argument(name: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            value: value.into(),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse {
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Run errors: surfaced by the coordinator
// =============================================================================

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("workers still blocked after the join timeout: {}", format_workers(.stuck))]
    JoinTimeout { stuck: Vec<WorkerId> },

    #[error("{worker} panicked: {message}")]
    WorkerPanicked { worker: WorkerId, message: String },
}

fn format_workers(workers: &[WorkerId]) -> String {
    workers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
