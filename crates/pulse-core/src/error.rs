//! Configuration error types.

use thiserror::Error;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating `pulse.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown check type: {0}")]
    UnknownCheckType(String),

    #[error("invalid duration for {field}: {value:?}")]
    InvalidDuration { field: String, value: String },

    #[error("duplicate check name: {0}")]
    DuplicateCheck(String),

    #[error("invalid check {name}: {reason}")]
    InvalidCheck { name: String, reason: String },

    #[error("invalid engine setting {field}: {reason}")]
    InvalidEngine { field: &'static str, reason: String },
}
