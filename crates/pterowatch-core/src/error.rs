//! Configuration error types.

use thiserror::Error;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while reading or validating `pterowatch.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration for `{field}`: {value:?}")]
    Duration { field: String, value: String },

    #[error("server entry {index} has an empty id")]
    EmptyId { index: usize },

    #[error("duplicate server id: {0}")]
    DuplicateId(String),

    #[error("invalid policy for {server}: {reason}")]
    Policy { server: String, reason: String },

    #[error("panel url is required")]
    MissingPanelUrl,
}
