//! Error types for configuration loading and store-path resolution.

use thiserror::Error;

/// Errors that can occur while loading configuration or locating the store.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// The application directory could not be determined or created.
    #[error("cannot resolve application directory: {0}")]
    PathResolution(String),
}

/// Convenience alias for results with [`ConfigError`].
pub type Result<T> = std::result::Result<T, ConfigError>;
