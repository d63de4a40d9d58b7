use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the bot supervisor
#[derive(Error, Debug)]
pub enum HerdError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Worker discovery errors
    #[error("Unable to read bot directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Worker process errors
    #[error("Failed to spawn worker {id}: {source}")]
    Spawn {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Channel to worker {0} is closed")]
    ChannelClosed(String),

    #[error("Unknown worker: {0}")]
    UnknownWorker(String),

    #[error("Worker is not running: {0}")]
    WorkerNotRunning(String),

    // State store errors
    #[error("exchange {0} not found")]
    ExchangeNotFound(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for HerdError
pub type Result<T> = std::result::Result<T, HerdError>;

impl HerdError {
    /// True for lookups against an exchange id the store has never seen
    pub fn is_not_found(&self) -> bool {
        matches!(self, HerdError::ExchangeNotFound(_))
    }
}
