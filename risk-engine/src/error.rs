//! Error types for risk engine

use thiserror::Error;

/// Risk engine error
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid weights, thresholds or normalization references
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Nothing to assess (user has no subscriptions)
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Record that cannot be placed on the user's timeline
    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    /// IO error while loading configuration or datasets
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed configuration file or dataset
    #[error("Parse error: {0}")]
    Parse(String),

    /// Batch worker panicked
    #[error("Worker error: {0}")]
    Worker(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
