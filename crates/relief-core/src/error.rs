//! Error types for Relief

use thiserror::Error;

/// The main error type for Relief operations
#[derive(Debug, Error)]
pub enum ReliefError {
    /// Missing height field, dimensions below 2, or above the safety cap
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A generation session is already active
    #[error("Terrain generation is already in progress")]
    Busy,

    /// Publish requested before the session completed
    #[error("Mesh not ready: {0}")]
    NotReady(String),

    /// The backing sample buffer could not be acquired or is inconsistent
    #[error("Resource fault: {0}")]
    ResourceFault(String),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),
}

/// Result type alias for Relief operations
pub type Result<T> = std::result::Result<T, ReliefError>;

impl From<toml::de::Error> for ReliefError {
    fn from(err: toml::de::Error) -> Self {
        ReliefError::TomlParseError(err.to_string())
    }
}
